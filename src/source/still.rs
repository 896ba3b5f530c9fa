//! Turning a single still image into an "animation"
//!
//! There's nothing to decode here: every frame is the same picture. It's only useful
//! for previewing a crop of a still image, optionally with a little wobble so that it
//! visibly animates.

use super::Source;
use crate::collector::Collector;
use crate::error::CatResult;
use crate::frame::{Frame, DEFAULT_DELAY_MS};
use imgref::{ImgRef, ImgVec};
use rgb::RGBA8;
use std::f64::consts::TAU;

/// How many copies of a still image are made by default
pub const DEFAULT_STILL_FRAMES: usize = 10;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Jitter {
    /// Identical copies
    #[default]
    None,
    /// Slight rotation and scaling that changes from frame to frame
    Wobble,
}

#[derive(Copy, Clone, Debug)]
pub struct StillOptions {
    pub frames: usize,
    pub delay_ms: u32,
    pub jitter: Jitter,
}

impl Default for StillOptions {
    fn default() -> Self {
        Self {
            frames: DEFAULT_STILL_FRAMES,
            delay_ms: DEFAULT_DELAY_MS,
            jitter: Jitter::None,
        }
    }
}

pub struct StillSource {
    image: ImgVec<RGBA8>,
    options: StillOptions,
}

impl StillSource {
    #[must_use]
    pub fn new(image: ImgVec<RGBA8>, options: StillOptions) -> Self {
        Self { image, options }
    }

    /// Decodes PNG data
    pub fn from_png(data: &[u8], options: StillOptions) -> CatResult<Self> {
        let image = lodepng::decode32(data)
            .map_err(|err| crate::Error::PNG(format!("Can't decode PNG: {err}")))?;
        Ok(Self::new(ImgVec::new(image.buffer, image.width, image.height), options))
    }

    fn frame(&self, index: usize) -> Frame {
        let image = match self.options.jitter {
            Jitter::None => self.image.clone(),
            Jitter::Wobble => {
                let phase = TAU * index as f64 / self.options.frames.max(1) as f64;
                let angle = phase.sin() * 3f64.to_radians();
                let scale = 1. + 0.03 * phase.cos();
                transformed(self.image.as_ref(), angle, scale)
            },
        };
        Frame::new(image, self.options.delay_ms)
    }
}

impl Source for StillSource {
    fn total_frames(&self) -> Option<u64> {
        Some(self.options.frames.max(1) as u64)
    }

    fn collect(&mut self, dest: &mut Collector) -> CatResult<()> {
        for i in 0..self.options.frames.max(1) {
            dest.add_frame(i, self.frame(i))?;
        }
        Ok(())
    }
}

/// Rotates by `angle` radians and scales around the centre. Pixels from outside become transparent.
fn transformed(src: ImgRef<'_, RGBA8>, angle: f64, scale: f64) -> ImgVec<RGBA8> {
    let (w, h) = (src.width(), src.height());
    let (cx, cy) = (w as f64 / 2., h as f64 / 2.);
    let (sin, cos) = (-angle).sin_cos();
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            // inverse mapping: where in the source does this output pixel come from
            let dx = (x as f64 + 0.5 - cx) / scale;
            let dy = (y as f64 + 0.5 - cy) / scale;
            let sx = (dx * cos - dy * sin + cx).floor();
            let sy = (dx * sin + dy * cos + cy).floor();
            out.push(if sx >= 0. && sy >= 0. && (sx as usize) < w && (sy as usize) < h {
                src[(sx as usize, sy as usize)]
            } else {
                RGBA8::new(0, 0, 0, 0)
            });
        }
    }
    ImgVec::new(out, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::collect_all;

    fn checkerboard() -> ImgVec<RGBA8> {
        let px = (0..64).map(|i| if (i % 8 + i / 8) % 2 == 0 { RGBA8::new(255, 255, 255, 255) } else { RGBA8::new(0, 0, 0, 255) }).collect();
        ImgVec::new(px, 8, 8)
    }

    #[test]
    fn copies_with_constant_delay() {
        let mut s = StillSource::new(checkerboard(), StillOptions::default());
        let frames = collect_all(&mut s).unwrap();
        assert_eq!(frames.len(), DEFAULT_STILL_FRAMES);
        assert!(frames.iter().all(|f| f.delay_ms == 100 && f.image == checkerboard()));
    }

    #[test]
    fn wobble_changes_pixels_but_not_size() {
        let gradient = ImgVec::new((0..64 * 64).map(|i| RGBA8::new((i % 64) as u8 * 4, (i / 64) as u8 * 4, 0, 255)).collect(), 64, 64);
        let mut s = StillSource::new(gradient, StillOptions { frames: 6, delay_ms: 50, jitter: Jitter::Wobble });
        let frames = collect_all(&mut s).unwrap();
        assert_eq!(frames.len(), 6);
        assert!(frames.iter().all(|f| f.width() == 64 && f.height() == 64 && f.delay_ms == 50));
        assert_ne!(frames[1].image, frames[0].image);
        assert_ne!(frames[2].image, frames[1].image);
    }

    #[test]
    fn identity_transform() {
        assert_eq!(transformed(checkerboard().as_ref(), 0., 1.), checkerboard());
    }
}
