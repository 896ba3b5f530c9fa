//! This is for reading GIFs as an input for cropping and re-encoding

use super::Source;
use crate::collector::Collector;
use crate::error::CatResult;
use crate::frame::{Frame, DEFAULT_DELAY_MS};
use gif::Decoder;
use std::io::Cursor;

pub struct GifSource {
    decoder: Decoder<Cursor<Vec<u8>>>,
    screen: gif_dispose::Screen,
}

impl GifSource {
    pub fn new(data: Vec<u8>) -> CatResult<Self> {
        let mut gif_opts = gif::DecodeOptions::new();
        // Important:
        gif_opts.set_color_output(gif::ColorOutput::Indexed);

        let decoder = gif_opts.read_info(Cursor::new(data))?;
        let screen = gif_dispose::Screen::new_decoder(&decoder);
        log::debug!("GIF screen is {}×{}", decoder.width(), decoder.height());

        Ok(Self {
            decoder,
            screen,
        })
    }
}

impl Source for GifSource {
    fn total_frames(&self) -> Option<u64> { None }

    /// Every frame is composited onto the screen according to the previous frame's disposal,
    /// so each collected frame is a complete picture.
    fn collect(&mut self, c: &mut Collector) -> CatResult<()> {
        let mut idx = 0;
        while let Some(frame) = self.decoder.read_next_frame()? {
            self.screen.blit_frame(frame)?;
            let pixels = self.screen.pixels_rgba().map_buf(|b| b.to_owned());
            let delay_ms = if frame.delay == 0 { DEFAULT_DELAY_MS } else { u32::from(frame.delay) * 10 };
            c.add_frame(idx, Frame::new(pixels, delay_ms))?;
            idx += 1;
        }
        if idx == 0 {
            return Err(crate::Error::Decode("The GIF has no frames".into()));
        }
        Ok(())
    }
}
