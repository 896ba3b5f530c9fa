//! Seekable video inputs and the arithmetic for sampling them

use crate::error::{CatResult, Error};
use imgref::ImgRef;
use rgb::RGBA8;

#[cfg(feature = "y4m")]
mod y4m;
#[cfg(feature = "y4m")]
pub use self::y4m::Y4mVideo;

#[cfg(feature = "video")]
mod ffmpeg;
#[cfg(feature = "video")]
pub use self::ffmpeg::FfmpegVideo;

/// Highest sampling rate accepted
pub const MAX_FPS: f64 = 100.;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VideoInfo {
    /// In seconds
    pub duration: f64,
    pub width: usize,
    pub height: usize,
}

/// A video that can be positioned at any time and shows one picture there.
pub trait Video: Send {
    fn info(&self) -> VideoInfo;

    /// Moves the playhead to `time` seconds.
    ///
    /// Returns only once the picture at that time can be read with [`Video::picture`].
    fn seek(&mut self, time: f64) -> CatResult<()>;

    /// The picture at the playhead, in the video's natural size
    fn picture(&self) -> CatResult<ImgRef<'_, RGBA8>>;
}

impl<V: Video + ?Sized> Video for Box<V> {
    fn info(&self) -> VideoInfo {
        (**self).info()
    }

    fn seek(&mut self, time: f64) -> CatResult<()> {
        (**self).seek(time)
    }

    fn picture(&self) -> CatResult<ImgRef<'_, RGBA8>> {
        (**self).picture()
    }
}

/// Part of the video to sample, `[start, end)` in seconds
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeWindow {
    start: f64,
    end: f64,
}

impl TimeWindow {
    /// Fails with [`Error::InvalidTimeRange`] unless `0 ≤ start < end`
    pub fn new(start: f64, end: f64) -> CatResult<Self> {
        if !start.is_finite() || !end.is_finite() || start < 0. || start >= end {
            return Err(Error::InvalidTimeRange(start, end));
        }
        Ok(Self { start, end })
    }

    /// The first `secs` seconds, or less if the video is shorter
    pub fn leading(secs: f64, duration: f64) -> CatResult<Self> {
        Self::new(0., secs.min(duration))
    }

    #[inline]
    #[must_use]
    pub fn start(&self) -> f64 {
        self.start
    }

    #[inline]
    #[must_use]
    pub fn end(&self) -> f64 {
        self.end
    }

    #[inline]
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Cuts the window at the end of the video
    pub fn clamp_to(self, video_duration: f64) -> CatResult<Self> {
        if video_duration.is_finite() && self.end > video_duration {
            log::warn!("end time {}s is past the end of the video; using {}s", self.end, video_duration);
            return Self::new(self.start, video_duration);
        }
        Ok(self)
    }

    /// `⌈duration × fps⌉`, at least 1
    #[must_use]
    pub fn frame_count(&self, fps: f64) -> usize {
        // (0.3 × 10) is 3.0000000000000004 in floating point, which shouldn't become 4 frames
        ((self.duration() * fps - 1e-9).ceil() as usize).max(1)
    }

    /// Evenly spaced sampling instants, starting at `start`
    pub fn sample_times(&self, fps: f64) -> impl Iterator<Item = f64> {
        let count = self.frame_count(fps);
        let interval = self.duration() / count as f64;
        let start = self.start;
        (0..count).map(move |i| start + i as f64 * interval)
    }
}

/// Size of the sampled frames
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum SizePolicy {
    /// Natural size of the video
    #[default]
    Original,
    /// Longer edge becomes this many pixels, aspect ratio is preserved
    LongEdge(u32),
}

impl SizePolicy {
    #[must_use]
    pub fn output_size(&self, width: usize, height: usize) -> (usize, usize) {
        match *self {
            Self::Original => (width, height),
            Self::LongEdge(_) if width == 0 || height == 0 => (width, height),
            Self::LongEdge(edge) => {
                let edge = (edge as usize).max(1);
                if width >= height {
                    (edge, ((height * edge) as f64 / width as f64).round().max(1.) as usize)
                } else {
                    (((width * edge) as f64 / height as f64).round().max(1.) as usize, edge)
                }
            },
        }
    }
}

impl std::str::FromStr for SizePolicy {
    type Err = Error;

    fn from_str(s: &str) -> CatResult<Self> {
        if s.eq_ignore_ascii_case("original") {
            return Ok(Self::Original);
        }
        match s.parse::<u32>() {
            Ok(px) if px > 0 => Ok(Self::LongEdge(px)),
            _ => Err(Error::InvalidSettings(format!("Size must be \"original\" or a number of pixels, not \"{s}\""))),
        }
    }
}

/// Checks the sampling rate
pub fn validate_fps(fps: f64) -> CatResult<()> {
    if !(fps.is_finite() && fps > 0.) {
        return Err(Error::InvalidSettings("FPS must be a positive number".into()));
    }
    if fps > MAX_FPS {
        return Err(Error::InvalidSettings("100 fps is maximum".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_windows() {
        assert!(matches!(TimeWindow::new(2., 2.), Err(Error::InvalidTimeRange(..))));
        assert!(matches!(TimeWindow::new(3., 1.), Err(Error::InvalidTimeRange(..))));
        assert!(matches!(TimeWindow::new(-1., 1.), Err(Error::InvalidTimeRange(..))));
        assert!(matches!(TimeWindow::new(f64::NAN, 1.), Err(Error::InvalidTimeRange(..))));
        assert!(TimeWindow::new(0., 0.1).is_ok());
    }

    #[test]
    fn frame_counts() {
        let w = TimeWindow::new(1., 2.5).unwrap();
        assert_eq!(w.frame_count(4.), 6);
        assert_eq!(w.frame_count(10.), 15);
        assert_eq!(w.frame_count(3.), 5);
        assert_eq!(TimeWindow::new(0., 0.3).unwrap().frame_count(10.), 3);
        assert_eq!(TimeWindow::new(0., 0.35).unwrap().frame_count(10.), 4);
        assert_eq!(TimeWindow::new(0., 0.01).unwrap().frame_count(1.), 1);
    }

    #[test]
    fn sample_times_are_evenly_spaced() {
        let w = TimeWindow::new(1., 2.).unwrap();
        let times: Vec<_> = w.sample_times(4.).collect();
        assert_eq!(times, [1., 1.25, 1.5, 1.75]);
        let w = TimeWindow::new(0., 0.35).unwrap();
        let times: Vec<_> = w.sample_times(10.).collect();
        assert_eq!(times.len(), 4);
        assert!((times[1] - 0.0875).abs() < 1e-12);
    }

    #[test]
    fn clamps_to_video_end() {
        let w = TimeWindow::new(1., 5.).unwrap().clamp_to(3.).unwrap();
        assert_eq!(w.end(), 3.);
        assert!(TimeWindow::new(4., 5.).unwrap().clamp_to(3.).is_err());
        assert_eq!(TimeWindow::leading(3., 1.5).unwrap().end(), 1.5);
    }

    #[test]
    fn long_edge_keeps_aspect() {
        assert_eq!(SizePolicy::Original.output_size(640, 360), (640, 360));
        assert_eq!(SizePolicy::LongEdge(320).output_size(640, 360), (320, 180));
        assert_eq!(SizePolicy::LongEdge(320).output_size(360, 640), (180, 320));
        assert_eq!(SizePolicy::LongEdge(480).output_size(100, 100), (480, 480));
        assert_eq!("original".parse::<SizePolicy>().unwrap(), SizePolicy::Original);
        assert_eq!("480".parse::<SizePolicy>().unwrap(), SizePolicy::LongEdge(480));
        assert!("big".parse::<SizePolicy>().is_err());
    }

    #[test]
    fn fps_limits() {
        assert!(validate_fps(10.).is_ok());
        assert!(validate_fps(0.).is_err());
        assert!(validate_fps(101.).is_err());
        assert!(validate_fps(f64::NAN).is_err());
    }
}
