//! For adding frames to the encoder
//!
//! [`gifcrop::new()`][crate::new] returns the [`Collector`] that collects sampled frames,
//! and a [`Writer`][crate::Writer] that crops, quantizes and writes them.

use crate::error::CatResult;
use crate::frame::Frame;
use crate::ordqueue::OrdQueue;

/// Collect frames that will be encoded
///
/// Note that writing will finish only when the collector is dropped.
/// Collect frames on another thread, or call `drop(collector)` before calling `writer.write()`!
pub struct Collector {
    pub(crate) queue: OrdQueue<Frame>,
}

impl Collector {
    /// Frame index starts at 0.
    ///
    /// Set each frame (index) only once, but you can set them in any order. However, out-of-order frames
    /// will be buffered in RAM, and big gaps in frame indices will cause high memory usage.
    ///
    /// If this function appears to be stuck after a few frames, it's because [`crate::Writer::write()`] is not running.
    pub fn add_frame(&self, frame_index: usize, frame: Frame) -> CatResult<()> {
        log::trace!("collected frame {frame_index} ({}×{}, {}ms)", frame.width(), frame.height(), frame.delay_ms);
        self.queue.push(frame_index, frame)
    }

    /// Adds already sampled frames in order, starting at index 0
    pub fn add_frames(&self, frames: impl IntoIterator<Item = Frame>) -> CatResult<()> {
        for (i, frame) in frames.into_iter().enumerate() {
            self.add_frame(i, frame)?;
        }
        Ok(())
    }
}
