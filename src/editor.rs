//! State of one editing session, driven by events
//!
//! The editor owns the loaded frames, the crop selection and playback. Everything that
//! happens to it (a file finished loading, the pointer moved, the playback timer fired)
//! is an [`Event`], and [`Editor::handle`] computes the next state from it.

use crate::cancel::{RunToken, RunTokens};
use crate::crop::{crop_frame, CropMapper, CropRegion, OutOfBounds, PixelRect, Size};
use crate::drag::CropHandle;
use crate::error::{CatResult, Error};
use crate::frame::Frame;
use crate::playback::Playback;
use crate::CropSettings;
use std::time::{Duration, Instant};

/// How long an error message stays visible
pub const NOTICE_TTL: Duration = Duration::from_secs(5);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// An image is loaded and a region of it is selected
    Crop,
    /// Frames sampled from a video are previewed as-is
    Convert,
}

#[derive(Debug)]
pub enum Event {
    Loaded(Vec<Frame>),
    LoadFailed(Error),
    PointerDown(f64, f64),
    PointerMove(f64, f64),
    PointerUp,
    /// The canvas is now shown at this size
    DisplayResized(Size),
    /// The playback timer fired
    Tick,
    TogglePlay,
    SelectFrame(usize),
    Reset,
}

/// A message for the user that goes away on its own
#[derive(Clone, Debug)]
pub struct Notice {
    pub message: String,
    pub shown_at: Instant,
}

impl Notice {
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) >= NOTICE_TTL
    }
}

pub struct Editor {
    mode: Mode,
    frames: Vec<Frame>,
    handle: CropHandle,
    initial_region: CropRegion,
    mapper: CropMapper,
    playback: Playback,
    preview: Option<Frame>,
    notice: Option<Notice>,
    runs: RunTokens,
}

impl Editor {
    #[must_use]
    pub fn new(mode: Mode, displayed: Size, region: CropRegion) -> Self {
        Self {
            mode,
            frames: Vec::new(),
            handle: CropHandle::new(region, displayed),
            initial_region: region,
            mapper: CropMapper::new(displayed, OutOfBounds::Skip),
            playback: Playback::new(0),
            preview: None,
            notice: None,
            runs: RunTokens::new(),
        }
    }

    /// Use [`OutOfBounds::Clamp`] instead of skipping regions that don't fit the frame
    #[must_use]
    pub fn with_policy(mut self, policy: OutOfBounds) -> Self {
        self.mapper = CropMapper::new(self.mapper.displayed(), policy);
        self
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[inline]
    #[must_use]
    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    #[inline]
    #[must_use]
    pub fn region(&self) -> CropRegion {
        self.handle.region()
    }

    /// The frame as it should be shown next to the original: cropped in [`Mode::Crop`].
    ///
    /// When the region can't be mapped onto the current frame this is the last preview
    /// that could be made.
    #[inline]
    #[must_use]
    pub fn preview(&self) -> Option<&Frame> {
        self.preview.as_ref()
    }

    /// The current message, unless it has been shown for [`NOTICE_TTL`] already
    #[must_use]
    pub fn notice(&self, now: Instant) -> Option<&str> {
        self.notice.as_ref()
            .filter(|n| !n.is_expired(now))
            .map(|n| n.message.as_str())
    }

    /// Starts a new loading/sampling run. Results of any earlier run will be ignored.
    pub fn begin_run(&mut self) -> RunToken {
        self.runs.begin()
    }

    /// Hands over the result of a run started with [`Editor::begin_run`].
    ///
    /// Returns `false` if the run has been superseded in the meantime; its result is dropped.
    pub fn finish_run(&mut self, run: &RunToken, result: CatResult<Vec<Frame>>) -> bool {
        if !run.is_current() {
            log::debug!("dropping result of a superseded run");
            return false;
        }
        match result {
            Ok(frames) => self.handle(Event::Loaded(frames)),
            Err(Error::Superseded) => return false,
            Err(err) => self.handle(Event::LoadFailed(err)),
        };
        true
    }

    /// How long until the next [`Event::Tick`] is due, if playing
    #[must_use]
    pub fn next_delay(&self) -> Option<Duration> {
        if !self.playback.is_playing() || !self.playback.is_animated() {
            return None;
        }
        let frame = self.frames.get(self.playback.current())?;
        Some(Duration::from_millis(frame.delay_ms.into()))
    }

    /// Pixels of the current frame that would be exported
    #[must_use]
    pub fn crop_rect(&self) -> Option<PixelRect> {
        let frame = self.frames.get(self.playback.current())?;
        self.mapper.map(self.handle.region(), frame.width(), frame.height())
    }

    /// What the [`crate::Writer`] needs to crop the frames like the preview
    #[must_use]
    pub fn crop_settings(&self) -> Option<CropSettings> {
        match self.mode {
            Mode::Crop => Some(CropSettings {
                region: self.handle.region(),
                displayed: Some(self.mapper.displayed()),
                policy: self.mapper.policy(),
            }),
            Mode::Convert => None,
        }
    }

    /// Applies the event. Returns `true` if anything visible changed.
    pub fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::Loaded(frames) => {
                if frames.is_empty() {
                    self.show_notice(&Error::NoFrames);
                    return true;
                }
                log::debug!("loaded {} frames", frames.len());
                self.playback = Playback::new(frames.len());
                self.frames = frames;
                self.preview = None;
                self.notice = None;
                self.update_preview();
                true
            },
            Event::LoadFailed(err) => {
                self.show_notice(&err);
                true
            },
            Event::PointerDown(x, y) => self.mode == Mode::Crop && self.handle.pointer_down(x, y),
            Event::PointerMove(x, y) => {
                if self.mode != Mode::Crop || !self.handle.pointer_move(x, y) {
                    return false;
                }
                self.update_preview();
                true
            },
            Event::PointerUp => {
                self.handle.pointer_up();
                false
            },
            Event::DisplayResized(size) => {
                self.handle.set_bounds(size);
                self.mapper.set_displayed(size);
                self.update_preview();
                true
            },
            Event::Tick => {
                if !self.playback.is_playing() || !self.playback.is_animated() {
                    return false;
                }
                self.playback.advance();
                self.update_preview();
                true
            },
            Event::TogglePlay => {
                self.playback.toggle();
                true
            },
            Event::SelectFrame(index) => {
                if !self.playback.select(index) {
                    return false;
                }
                self.update_preview();
                true
            },
            Event::Reset => {
                self.runs.cancel_all();
                self.frames.clear();
                self.playback = Playback::new(0);
                self.preview = None;
                self.notice = None;
                self.handle = CropHandle::new(self.initial_region, self.mapper.displayed());
                true
            },
        }
    }

    fn show_notice(&mut self, err: &Error) {
        if err.is_user_error() {
            log::warn!("{err}");
        } else {
            log::error!("{err}");
        }
        self.notice = Some(Notice {
            message: err.to_string(),
            shown_at: Instant::now(),
        });
    }

    fn update_preview(&mut self) {
        let Some(frame) = self.frames.get(self.playback.current()) else {
            return;
        };
        match self.mode {
            Mode::Convert => self.preview = Some(frame.clone()),
            Mode::Crop => match self.mapper.map(self.handle.region(), frame.width(), frame.height()) {
                Some(rect) => self.preview = Some(crop_frame(frame, rect)),
                None => log::trace!("crop region doesn't fit frame {}; keeping the previous preview", self.playback.current()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::ImgVec;
    use rgb::RGBA8;

    fn frames(n: usize, width: usize, height: usize) -> Vec<Frame> {
        (0..n).map(|i| {
            let pixels = (0..width * height).map(|p| RGBA8::new(i as u8, (p % width) as u8, (p / width) as u8, 255)).collect();
            Frame::new(ImgVec::new(pixels, width, height), 100)
        }).collect()
    }

    fn crop_editor() -> Editor {
        let mut ed = Editor::new(Mode::Crop, Size::new(100., 100.), CropRegion::new(10., 10., 20., 20.));
        ed.handle(Event::Loaded(frames(3, 200, 200)));
        ed
    }

    #[test]
    fn preview_is_scaled_crop() {
        let ed = crop_editor();
        let rect = ed.crop_rect().unwrap();
        assert_eq!(rect, PixelRect { left: 20, top: 20, width: 40, height: 40 });
        let preview = ed.preview().unwrap();
        assert_eq!((preview.width(), preview.height()), (40, 40));
        assert_eq!(preview.image.buf()[0], RGBA8::new(0, 20, 20, 255));
    }

    #[test]
    fn dragging_moves_preview() {
        let mut ed = crop_editor();
        assert!(ed.handle(Event::PointerDown(15., 15.)));
        assert!(ed.handle(Event::PointerMove(25., 20.)));
        ed.handle(Event::PointerUp);
        assert_eq!(ed.region(), CropRegion::new(20., 15., 20., 20.));
        assert_eq!(ed.preview().unwrap().image.buf()[0], RGBA8::new(0, 40, 30, 255));
        assert!(!ed.handle(Event::PointerMove(90., 90.)));
    }

    #[test]
    fn drag_stays_on_canvas() {
        let mut ed = crop_editor();
        ed.handle(Event::PointerDown(15., 15.));
        ed.handle(Event::PointerMove(500., -500.));
        assert_eq!(ed.region(), CropRegion::new(80., 0., 20., 20.));
    }

    #[test]
    fn skipped_region_keeps_previous_preview() {
        let mut ed = crop_editor();
        let before = ed.preview().unwrap().clone();
        // the canvas shrinks below the region's size, so the region can't fit any more
        ed.handle(Event::DisplayResized(Size::new(10., 10.)));
        assert_eq!((ed.region().x, ed.region().y), (0., 0.));
        assert!(ed.crop_rect().is_none());
        ed.handle(Event::Tick);
        assert_eq!(ed.playback().current(), 1);
        assert_eq!(ed.preview().unwrap().image.buf(), before.image.buf());

        let mut clamping = Editor::new(Mode::Crop, Size::new(10., 10.), CropRegion::new(0., 0., 20., 20.))
            .with_policy(OutOfBounds::Clamp);
        clamping.handle(Event::Loaded(frames(1, 200, 200)));
        assert_eq!(clamping.crop_rect(), Some(PixelRect { left: 0, top: 0, width: 200, height: 200 }));
    }

    #[test]
    fn ticks_cycle_while_playing() {
        let mut ed = crop_editor();
        assert_eq!(ed.next_delay(), Some(Duration::from_millis(100)));
        for _ in 0..3 {
            assert!(ed.handle(Event::Tick));
        }
        assert_eq!(ed.playback().current(), 0);
        ed.handle(Event::TogglePlay);
        assert!(!ed.handle(Event::Tick));
        assert_eq!(ed.next_delay(), None);
        assert!(ed.handle(Event::SelectFrame(2)));
        assert!(!ed.handle(Event::SelectFrame(3)));
        assert_eq!(ed.preview().unwrap().image.buf()[0].r, 2);
    }

    #[test]
    fn failures_show_expiring_notice() {
        let mut ed = crop_editor();
        ed.handle(Event::LoadFailed(Error::InvalidTimeRange(3., 1.)));
        let now = Instant::now();
        assert!(ed.notice(now).is_some());
        assert!(ed.notice(now + NOTICE_TTL + Duration::from_millis(1)).is_none());
        // not fatal: the frames are still there
        assert_eq!(ed.frames().len(), 3);
    }

    #[test]
    fn stale_runs_are_ignored() {
        let mut ed = crop_editor();
        let old = ed.begin_run();
        let new = ed.begin_run();
        assert!(!ed.finish_run(&old, Ok(frames(7, 10, 10))));
        assert_eq!(ed.frames().len(), 3);
        assert!(ed.finish_run(&new, Ok(frames(5, 10, 10))));
        assert_eq!(ed.frames().len(), 5);
    }

    #[test]
    fn reset_cancels_runs() {
        let mut ed = crop_editor();
        let run = ed.begin_run();
        ed.handle(Event::PointerDown(15., 15.));
        ed.handle(Event::PointerMove(40., 40.));
        ed.handle(Event::Reset);
        assert!(!run.is_current());
        assert!(ed.frames().is_empty());
        assert!(ed.preview().is_none());
        assert_eq!(ed.region(), CropRegion::new(10., 10., 20., 20.));
    }

    #[test]
    fn convert_mode_previews_whole_frames() {
        let mut ed = Editor::new(Mode::Convert, Size::new(100., 100.), CropRegion::default());
        ed.handle(Event::Loaded(frames(2, 30, 20)));
        assert!(!ed.handle(Event::PointerDown(20., 20.)));
        assert_eq!(ed.preview().unwrap().width(), 30);
        assert!(ed.crop_settings().is_none());
    }
}
