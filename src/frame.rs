//! Sampled animation frames

pub use imgref::{ImgRef, ImgVec};
pub use rgb::RGBA8;

use crate::error::{CatResult, Error};

/// Delay used when a source doesn't say how long a frame should be shown
pub const DEFAULT_DELAY_MS: u32 = 100;

/// One sampled picture and how long it stays on screen.
///
/// Frames are created by a [`Source`][crate::source::Source] and never modified afterwards;
/// cropping and resizing produce new frames.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub image: ImgVec<RGBA8>,
    pub delay_ms: u32,
}

impl Frame {
    #[inline]
    #[must_use]
    pub fn new(image: ImgVec<RGBA8>, delay_ms: u32) -> Self {
        Self { image, delay_ms }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.image.width()
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.image.height()
    }

    /// Same delay, pixels scaled with Lanczos3
    pub fn resized(&self, width: usize, height: usize) -> CatResult<Self> {
        Ok(Self::new(resize_image(self.image.as_ref(), width, height)?, self.delay_ms))
    }

    /// GIF stores delays in 1/100s. Delays under 20ms are shown much slower by browsers, so they're bumped up.
    #[must_use]
    pub fn gif_delay(&self) -> u16 {
        let centis = (self.delay_ms + 5) / 10;
        centis.clamp(2, u32::from(u16::MAX)) as u16
    }
}

pub(crate) fn resize_image(image: ImgRef<'_, RGBA8>, width: usize, height: usize) -> CatResult<ImgVec<RGBA8>> {
    if width == 0 || height == 0 {
        return Err(Error::WrongSize(format!("Can't resize to {width}×{height}")));
    }
    let (buf, src_width, src_height) = image.to_contiguous_buf();
    if src_width == width && src_height == height {
        return Ok(ImgVec::new(buf.into_owned(), width, height));
    }
    let mut r = resize::new(src_width, src_height, width, height, resize::Pixel::RGBA8P, resize::Type::Lanczos3)?;
    let mut dst = vec![RGBA8::new(0, 0, 0, 0); width * height];
    r.resize(&buf, &mut dst)?;
    Ok(ImgVec::new(dst, width, height))
}

/// Delay of one frame sampled at `fps`, rounded to whole milliseconds
#[must_use]
pub fn delay_for_fps(fps: f64) -> u32 {
    (1000. / fps).round() as u32
}

/// Length of one loop of the animation in milliseconds
#[must_use]
pub fn total_duration_ms(frames: &[Frame]) -> u64 {
    frames.iter().map(|f| u64::from(f.delay_ms)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(delay_ms: u32) -> Frame {
        Frame::new(ImgVec::new(vec![RGBA8::new(0, 0, 0, 255); 4], 2, 2), delay_ms)
    }

    #[test]
    fn gif_delay_rounds_to_centiseconds() {
        assert_eq!(blank(100).gif_delay(), 10);
        assert_eq!(blank(67).gif_delay(), 7);
        assert_eq!(blank(33).gif_delay(), 3);
        assert_eq!(blank(0).gif_delay(), 2);
    }

    #[test]
    fn fps_delays() {
        assert_eq!(delay_for_fps(10.), 100);
        assert_eq!(delay_for_fps(15.), 67);
        assert_eq!(delay_for_fps(30.), 33);
        assert_eq!(total_duration_ms(&[blank(100), blank(50)]), 150);
    }
}
