//! Where frames come from

use crate::collector::Collector;
use crate::error::CatResult;

mod gif_source;
mod still;
mod video_sampler;

pub use self::gif_source::GifSource;
pub use self::still::{Jitter, StillOptions, StillSource, DEFAULT_STILL_FRAMES};
pub use self::video_sampler::VideoSampler;

/// Produces frames and pushes them into a [`Collector`], in order, starting at index 0.
pub trait Source: Send {
    /// How many frames `collect` will produce, if known up front
    fn total_frames(&self) -> Option<u64>;

    fn collect(&mut self, dest: &mut Collector) -> CatResult<()>;
}

/// Runs a source to completion and keeps the frames, for previewing and playback
pub fn collect_all(source: &mut dyn Source) -> CatResult<Vec<crate::Frame>> {
    let (queue, iter) = crate::ordqueue::unbounded();
    let mut collector = Collector { queue };
    source.collect(&mut collector)?;
    drop(collector);
    iter.collect()
}
