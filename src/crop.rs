//! Mapping a crop region drawn over a (possibly scaled) on-screen canvas onto frame pixels
//!
//! The region is kept in displayed coordinates, because that's where the user drags it.
//! The frame's backing buffer may be larger or smaller than what's on screen, so the region
//! is multiplied by the [`ScaleFactor`] before pixels are sampled.

use crate::frame::Frame;
use imgref::ImgVec;

/// Size of the canvas as it's shown on screen
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[inline]
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    #[inline]
    #[must_use]
    pub fn of_frame(frame: &Frame) -> Self {
        Self::new(frame.width() as f64, frame.height() as f64)
    }

    fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0. && self.height > 0.
    }
}

/// Region of interest in displayed coordinates
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CropRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRegion {
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && py >= self.y && px < self.x + self.width && py < self.y + self.height
    }
}

impl Default for CropRegion {
    /// The editor's initial selection
    fn default() -> Self {
        Self::new(10., 10., 50., 50.)
    }
}

/// backing buffer size ÷ displayed size, per axis
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScaleFactor {
    pub x: f64,
    pub y: f64,
}

impl ScaleFactor {
    /// `None` if the canvas isn't visible (zero or non-finite size)
    #[must_use]
    pub fn new(backing_width: usize, backing_height: usize, displayed: Size) -> Option<Self> {
        if !displayed.is_usable() {
            return None;
        }
        Some(Self {
            x: backing_width as f64 / displayed.width,
            y: backing_height as f64 / displayed.height,
        })
    }
}

/// Unrounded rectangle in backing-buffer coordinates
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BufferRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Whole-pixel rectangle that is guaranteed to lie inside the frame it was mapped for
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub left: usize,
    pub top: usize,
    pub width: usize,
    pub height: usize,
}

/// What to do when the scaled region sticks out of the frame
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum OutOfBounds {
    /// Don't sample at all; the previous preview stays on screen
    #[default]
    Skip,
    /// Move the rectangle inside the frame, shrinking it only if it's larger than the frame
    Clamp,
}

// Rounding slack, so that a region flush with the canvas edge isn't rejected
// because of float error in the scale factor.
const EDGE_SLACK: f64 = 1e-6;

#[derive(Copy, Clone, Debug)]
pub struct CropMapper {
    displayed: Size,
    policy: OutOfBounds,
}

impl CropMapper {
    #[must_use]
    pub fn new(displayed: Size, policy: OutOfBounds) -> Self {
        Self { displayed, policy }
    }

    /// Call whenever the canvas is shown at a different size
    pub fn set_displayed(&mut self, displayed: Size) {
        self.displayed = displayed;
    }

    #[must_use]
    pub fn displayed(&self) -> Size {
        self.displayed
    }

    #[must_use]
    pub fn policy(&self) -> OutOfBounds {
        self.policy
    }

    /// The region in backing-buffer coordinates, without any bounds checks
    #[must_use]
    pub fn scale_rect(&self, region: CropRegion, frame_width: usize, frame_height: usize) -> Option<BufferRect> {
        let scale = ScaleFactor::new(frame_width, frame_height, self.displayed)?;
        Some(BufferRect {
            x: region.x * scale.x,
            y: region.y * scale.y,
            width: region.width * scale.x,
            height: region.height * scale.y,
        })
    }

    /// Pixels of a `frame_width`×`frame_height` frame covered by the region.
    ///
    /// `None` means "don't sample": the region is empty, the canvas has no size,
    /// or (with [`OutOfBounds::Skip`]) the region isn't entirely inside the frame.
    #[must_use]
    pub fn map(&self, region: CropRegion, frame_width: usize, frame_height: usize) -> Option<PixelRect> {
        let rect = self.scale_rect(region, frame_width, frame_height)?;
        if ![rect.x, rect.y, rect.width, rect.height].iter().all(|v| v.is_finite()) || rect.width <= 0. || rect.height <= 0. {
            return None;
        }
        let (fw, fh) = (frame_width as f64, frame_height as f64);

        let (x, y, width, height) = match self.policy {
            OutOfBounds::Skip => {
                if rect.x < -EDGE_SLACK || rect.y < -EDGE_SLACK ||
                    rect.x + rect.width > fw + EDGE_SLACK || rect.y + rect.height > fh + EDGE_SLACK {
                    return None;
                }
                (rect.x, rect.y, rect.width, rect.height)
            },
            OutOfBounds::Clamp => {
                let width = rect.width.min(fw);
                let height = rect.height.min(fh);
                (rect.x.clamp(0., fw - width), rect.y.clamp(0., fh - height), width, height)
            },
        };

        let left = (x.round().max(0.) as usize).min(frame_width);
        let top = (y.round().max(0.) as usize).min(frame_height);
        let right = ((x + width).round().max(0.) as usize).min(frame_width);
        let bottom = ((y + height).round().max(0.) as usize).min(frame_height);
        if right <= left || bottom <= top {
            return None;
        }
        Some(PixelRect { left, top, width: right - left, height: bottom - top })
    }
}

/// Copies the pixels under `rect`. The delay is kept.
///
/// `rect` must come from [`CropMapper::map`] for a frame of the same size.
#[must_use]
pub fn crop_frame(frame: &Frame, rect: PixelRect) -> Frame {
    let sub = frame.image.sub_image(rect.left, rect.top, rect.width, rect.height);
    let (buf, width, height) = sub.to_contiguous_buf();
    Frame::new(ImgVec::new(buf.into_owned(), width, height), frame.delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgb::RGBA8;

    #[test]
    fn scale_is_backing_over_displayed() {
        for &(bw, bh, dw, dh) in &[(100, 50, 100., 50.), (400, 300, 200., 150.), (37, 91, 512., 13.), (1, 1, 3., 7.)] {
            let s = ScaleFactor::new(bw, bh, Size::new(dw, dh)).unwrap();
            assert_eq!(s.x, bw as f64 / dw);
            assert_eq!(s.y, bh as f64 / dh);
        }
        assert!(ScaleFactor::new(10, 10, Size::new(0., 10.)).is_none());
        assert!(ScaleFactor::new(10, 10, Size::new(10., f64::NAN)).is_none());
    }

    #[test]
    fn scaled_size_is_linear_in_crop_size() {
        let m = CropMapper::new(Size::new(200., 100.), OutOfBounds::Skip);
        let a = m.scale_rect(CropRegion::new(5., 5., 10., 20.), 600, 400).unwrap();
        let b = m.scale_rect(CropRegion::new(5., 5., 30., 60.), 600, 400).unwrap();
        assert_eq!(a.width * 3., b.width);
        assert_eq!(a.height * 3., b.height);
        assert_eq!(a.x, 15.);
        assert_eq!(a.y, 20.);
    }

    #[test]
    fn maps_with_scale() {
        let m = CropMapper::new(Size::new(100., 100.), OutOfBounds::Skip);
        assert_eq!(m.map(CropRegion::new(10., 20., 30., 40.), 200, 200), Some(PixelRect { left: 20, top: 40, width: 60, height: 80 }));
    }

    #[test]
    fn flush_with_edge_is_inside() {
        let m = CropMapper::new(Size::new(30., 30.), OutOfBounds::Skip);
        assert_eq!(m.map(CropRegion::new(20., 20., 10., 10.), 100, 100), Some(PixelRect { left: 67, top: 67, width: 33, height: 33 }));
    }

    #[test]
    fn skip_out_of_bounds() {
        let m = CropMapper::new(Size::new(100., 100.), OutOfBounds::Skip);
        assert_eq!(m.map(CropRegion::new(60., 0., 50., 50.), 100, 100), None);
        assert_eq!(m.map(CropRegion::new(-1., 0., 50., 50.), 100, 100), None);
        assert_eq!(m.map(CropRegion::new(0., 0., 0., 50.), 100, 100), None);
    }

    #[test]
    fn clamp_moves_inside() {
        let m = CropMapper::new(Size::new(100., 100.), OutOfBounds::Clamp);
        assert_eq!(m.map(CropRegion::new(60., -5., 50., 50.), 100, 100), Some(PixelRect { left: 50, top: 0, width: 50, height: 50 }));
        assert_eq!(m.map(CropRegion::new(0., 0., 500., 50.), 100, 100), Some(PixelRect { left: 0, top: 0, width: 100, height: 50 }));
    }

    #[test]
    fn crops_pixels() {
        let pixels = (0..16u8).map(|i| RGBA8::new(i, 0, 0, 255)).collect();
        let frame = Frame::new(ImgVec::new(pixels, 4, 4), 70);
        let out = crop_frame(&frame, PixelRect { left: 1, top: 2, width: 2, height: 2 });
        assert_eq!(out.delay_ms, 70);
        assert_eq!((out.width(), out.height()), (2, 2));
        let reds: Vec<u8> = out.image.pixels().map(|p| p.r).collect();
        assert_eq!(reds, [9, 10, 13, 14]);
    }
}
