/*
 gifcrop GIF cropping and video sampling tool

 This program is free software: you can redistribute it and/or modify
 it under the terms of the GNU Affero General Public License as
 published by the Free Software Foundation, either version 3 of the
 License, or (at your option) any later version.

 This program is distributed in the hope that it will be useful,
 but WITHOUT ANY WARRANTY; without even the implied warranty of
 MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 GNU Affero General Public License for more details.

 You should have received a copy of the GNU Affero General Public License
 along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
//! Crop animated GIFs, or sample part of a video into one.
//!
//! Frames come from a [`source::Source`] (a decoded GIF, a still image, or a [`video::Video`]
//! sampled at a fixed rate). They're pushed into a [`Collector`], and the [`Writer`] crops,
//! quantizes and writes them as an animated GIF.

use imgref::*;
use rgb::*;

mod error;
pub use crate::error::*;
mod ordqueue;
use crate::ordqueue::OrdQueueIter;
pub mod progress;
use crate::progress::*;
pub mod collector;
pub use crate::collector::Collector;
mod encoder;

pub mod cancel;
pub mod crop;
pub mod drag;
pub mod editor;
pub mod frame;
pub mod input;
#[cfg(feature = "url")]
pub mod net;
pub mod playback;
pub mod source;
pub mod video;

pub use crate::crop::{CropRegion, OutOfBounds, Size};
pub use crate::frame::Frame;
pub use crate::video::SizePolicy;
pub use gif::Repeat;

use std::io::prelude::*;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// How long the writer waits for the next frame before giving up on the source
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(30);

/// Which part of each frame to keep
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CropSettings {
    pub region: CropRegion,
    /// Size the frames were shown at when the region was chosen. `None` means the frames' own size.
    pub displayed: Option<Size>,
    pub policy: OutOfBounds,
}

impl CropSettings {
    /// Pixels of `frame` covered by the region
    pub fn pixel_rect(&self, frame: &Frame) -> CatResult<crop::PixelRect> {
        let displayed = self.displayed.unwrap_or_else(|| Size::of_frame(frame));
        crop::CropMapper::new(displayed, self.policy)
            .map(self.region, frame.width(), frame.height())
            .ok_or(Error::CropOutOfBounds)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Settings {
    /// Crop every frame to this region
    pub crop: Option<CropSettings>,
    /// Resize after cropping
    pub size: SizePolicy,
    /// 1-100
    pub quality: u8,
    /// Lower quality, but faster encode
    pub fast: bool,
    pub repeat: Repeat,
    /// Fail with [`Error::Timeout`] if the source produces nothing for this long
    pub frame_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            crop: None,
            size: SizePolicy::Original,
            quality: 90,
            fast: false,
            repeat: Repeat::Infinite,
            frame_timeout: Some(DEFAULT_FRAME_TIMEOUT),
        }
    }
}

impl Settings {
    /// Crop, then resize
    pub fn prepare(&self, frame: Frame) -> CatResult<Frame> {
        let frame = match &self.crop {
            Some(crop) => crop::crop_frame(&frame, crop.pixel_rect(&frame)?),
            None => frame,
        };
        let (width, height) = self.size.output_size(frame.width(), frame.height());
        if (width, height) == (frame.width(), frame.height()) {
            return Ok(frame);
        }
        frame.resized(width, height)
    }
}

/// Perform GIF writing
pub struct Writer {
    queue_iter: Option<OrdQueueIter<Frame>>,
    settings: Settings,
}

pub(crate) struct GIFFrame {
    image: ImgVec<u8>,
    pal: Vec<RGBA8>,
    delay: u16,
    transparent_index: Option<u8>,
}

/// Start new encoding
///
/// The `Collector` and `Writer` are meant to be used on separate threads.
pub fn new(settings: Settings) -> CatResult<(Collector, Writer)> {
    if settings.quality == 0 || settings.quality > 100 {
        return Err(Error::InvalidSettings(format!("Quality must be 1-100, not {}", settings.quality)));
    }
    let (queue, queue_iter) = ordqueue::new(4, settings.frame_timeout);

    Ok((
        Collector {
            queue,
        },
        Writer {
            queue_iter: Some(queue_iter),
            settings,
        },
    ))
}

/// Runs `source` on its own thread and writes everything it produces.
///
/// If the source fails, its error is returned rather than the writer's complaint about missing frames.
/// Other write errors (e.g. a timeout) leave the source thread to notice on its own (its next frame
/// can't be sent), so a source that is stuck doesn't hold up the error.
pub fn encode<W: Write>(mut source: Box<dyn source::Source>, settings: Settings, writer: W, reporter: &mut dyn ProgressReporter) -> CatResult<()> {
    let (mut collector, w) = new(settings)?;
    let decode_thread = thread::Builder::new().name("decode".into()).spawn(move || {
        source.collect(&mut collector)
    })?;
    match w.write(writer, reporter) {
        Ok(()) => decode_thread.join().map_err(|_| Error::ThreadSend)?,
        // the queue only closes after the source has returned, so joining can't block
        Err(err @ (Error::NoFrames | Error::ThreadSend)) => match decode_thread.join() {
            Ok(Err(source_err)) => Err(source_err),
            _ => Err(err),
        },
        Err(err) => Err(err),
    }
}

/// Encode collected frames
impl Writer {
    fn quantize(image: ImgRef<'_, RGBA8>, settings: &Settings) -> CatResult<(ImgVec<u8>, Vec<RGBA8>)> {
        let mut liq = imagequant::new();
        if settings.fast {
            liq.set_speed(10)?;
        }
        liq.set_quality(0, settings.quality)?;
        let (buf, width, height) = image.to_contiguous_buf();
        let mut img = liq.new_image_borrowed(&buf, width, height, 0.)?;
        img.add_fixed_color(RGBA8::new(0, 0, 0, 0))?;
        let mut res = liq.quantize(&mut img)?;
        res.set_dithering_level(0.5)?;

        let (pal, pal_img) = res.remapped(&mut img)?;
        debug_assert_eq!(width * height, pal_img.len());

        Ok((Img::new(pal_img, width, height), pal))
    }

    /// GIF has only on/off transparency
    fn binary_alpha(mut image: ImgVec<RGBA8>) -> ImgVec<RGBA8> {
        const DITHER: [u8; 64] = [
         0*2+8,48*2+8,12*2+8,60*2+8, 3*2+8,51*2+8,15*2+8,63*2+8,
        32*2+8,16*2+8,44*2+8,28*2+8,35*2+8,19*2+8,47*2+8,31*2+8,
         8*2+8,56*2+8, 4*2+8,52*2+8,11*2+8,59*2+8, 7*2+8,55*2+8,
        40*2+8,24*2+8,36*2+8,20*2+8,43*2+8,27*2+8,39*2+8,23*2+8,
         2*2+8,50*2+8,14*2+8,62*2+8, 1*2+8,49*2+8,13*2+8,61*2+8,
        34*2+8,18*2+8,46*2+8,30*2+8,33*2+8,17*2+8,45*2+8,29*2+8,
        10*2+8,58*2+8, 6*2+8,54*2+8, 9*2+8,57*2+8, 5*2+8,53*2+8,
        42*2+8,26*2+8,38*2+8,22*2+8,41*2+8,25*2+8,37*2+8,21*2+8];

        for (y, row) in image.rows_mut().enumerate() {
            for (x, px) in row.iter_mut().enumerate() {
                if px.a < 255 {
                    px.a = if px.a < DITHER[(y & 7) * 8 + (x & 7)] { 0 } else { 255 };
                }
            }
        }
        image
    }

    fn make_frames(frames: OrdQueueIter<Frame>, write_queue: mpsc::SyncSender<GIFFrame>, settings: &Settings) -> CatResult<()> {
        let mut screen_size = None;
        let mut i = 0;
        for frame in frames {
            let frame = settings.prepare(frame?)?;
            let size = (frame.width(), frame.height());
            match screen_size {
                None => screen_size = Some(size),
                Some(expected) if expected != size => {
                    return Err(Error::WrongSize(format!("Frame {} has wrong size ({}×{}, expected {}×{})", i + 1,
                        size.0, size.1, expected.0, expected.1)));
                },
                Some(_) => {},
            }

            let delay = frame.gif_delay();
            let image = Self::binary_alpha(frame.image);
            let (image, pal) = Self::quantize(image.as_ref(), settings)?;
            let transparent_index = pal.iter().position(|p| p.a == 0).map(|i| i as u8);
            write_queue.send(GIFFrame {
                image,
                pal,
                delay,
                transparent_index,
            }).map_err(|_| Error::ThreadSend)?;
            i += 1;
        }
        if i == 0 {
            return Err(Error::NoFrames);
        }
        log::debug!("quantized {i} frames");
        Ok(())
    }

    fn write_frames<W: Write>(write_queue_iter: mpsc::Receiver<GIFFrame>, enc: &mut encoder::RustEncoder<W>, reporter: &mut dyn ProgressReporter) -> CatResult<()> {
        for f in write_queue_iter {
            enc.write_frame(f)?;
            reporter.written_bytes(enc.written());
            if !reporter.increase() {
                return Err(Error::Aborted);
            }
        }
        enc.finish()?;
        Ok(())
    }

    /// Start writing frames. This function will not return until `Collector` is dropped.
    ///
    /// `writer` can be any writer, such as `File` or `&mut Vec`.
    ///
    /// `ProgressReporter.increase()` is called each time a new frame is being written.
    pub fn write<W: Write>(mut self, writer: W, reporter: &mut dyn ProgressReporter) -> CatResult<()> {
        let (write_queue, write_queue_iter) = mpsc::sync_channel(4);
        let queue_iter = self.queue_iter.take().ok_or(Error::ThreadSend)?;
        let settings = self.settings;
        let make_thread = thread::Builder::new().name("quantize".into()).spawn(move || {
            Self::make_frames(queue_iter, write_queue, &settings)
        })?;
        let mut enc = encoder::RustEncoder::new(writer, self.settings.repeat);
        Self::write_frames(write_queue_iter, &mut enc, reporter)?;
        make_thread.join().map_err(|_| Error::ThreadSend)??;
        Ok(())
    }
}
