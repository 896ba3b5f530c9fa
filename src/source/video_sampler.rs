use super::Source;
use crate::cancel::RunToken;
use crate::collector::Collector;
use crate::error::{CatResult, Error};
use crate::frame::{delay_for_fps, resize_image, Frame};
use crate::video::{validate_fps, SizePolicy, TimeWindow, Video};

/// Grabs evenly spaced pictures from a part of a video.
///
/// For a window of `d` seconds at `fps`, there are `⌈d × fps⌉` frames, spread `d / count` apart,
/// each shown for `1000 / fps` ms. Seeks happen one at a time and in increasing time order.
pub struct VideoSampler<V> {
    video: V,
    window: TimeWindow,
    fps: f64,
    size: SizePolicy,
    run: Option<RunToken>,
}

impl<V: Video> VideoSampler<V> {
    /// The window is cut at the end of the video. Empty windows and bad rates are rejected here,
    /// before anything is sampled.
    pub fn new(video: V, window: TimeWindow, fps: f64, size: SizePolicy) -> CatResult<Self> {
        validate_fps(fps)?;
        let info = video.info();
        if info.width == 0 || info.height == 0 {
            return Err(Error::Decode("The video has no picture".into()));
        }
        let window = window.clamp_to(info.duration)?;
        Ok(Self { video, window, fps, size, run: None })
    }

    /// Stop early once a newer run has started
    #[must_use]
    pub fn with_run(mut self, run: RunToken) -> Self {
        self.run = Some(run);
        self
    }

    #[must_use]
    pub fn window(&self) -> TimeWindow {
        self.window
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.window.frame_count(self.fps)
    }

    #[must_use]
    pub fn output_size(&self) -> (usize, usize) {
        let info = self.video.info();
        self.size.output_size(info.width, info.height)
    }
}

impl<V: Video> Source for VideoSampler<V> {
    fn total_frames(&self) -> Option<u64> {
        Some(self.frame_count() as u64)
    }

    fn collect(&mut self, dest: &mut Collector) -> CatResult<()> {
        let (width, height) = self.output_size();
        let delay_ms = delay_for_fps(self.fps);
        log::debug!("sampling {} frames from {}s–{}s at {}×{}", self.frame_count(), self.window.start(), self.window.end(), width, height);

        for (i, time) in self.window.sample_times(self.fps).enumerate() {
            if let Some(run) = &self.run {
                run.check()?;
            }
            self.video.seek(time)?;
            let picture = self.video.picture()?;
            let image = resize_image(picture, width, height)?;
            dest.add_frame(i, Frame::new(image, delay_ms))?;
        }
        Ok(())
    }
}
