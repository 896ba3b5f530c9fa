use crate::error::CatResult;
use crate::GIFFrame;
use gif::Repeat;
use std::cell::Cell;
use std::io::Write;
use std::iter::repeat;
use std::rc::Rc;

struct CountingWriter<W> {
    writer: W,
    written: Rc<Cell<u64>>,
}

impl<W: Write> Write for CountingWriter<W> {
    #[inline(always)]
    fn write(&mut self, buf: &[u8]) -> Result<usize, std::io::Error> {
        let len = self.writer.write(buf)?;
        self.written.set(self.written.get() + len as u64);
        Ok(len)
    }

    #[inline(always)]
    fn flush(&mut self) -> Result<(), std::io::Error> {
        self.writer.flush()
    }
}

/// Writes quantized frames with the `gif` crate.
///
/// The logical screen size is taken from the first frame, so nothing is written until then.
pub(crate) struct RustEncoder<W: Write> {
    writer: Option<W>,
    written: Rc<Cell<u64>>,
    repeat: Repeat,
    gif_enc: Option<gif::Encoder<CountingWriter<W>>>,
}

impl<W: Write> RustEncoder<W> {
    pub fn new(writer: W, repeat: Repeat) -> Self {
        Self {
            writer: Some(writer),
            written: Rc::new(Cell::new(0)),
            repeat,
            gif_enc: None,
        }
    }

    /// Bytes written so far
    pub fn written(&self) -> u64 {
        self.written.get()
    }

    #[cfg_attr(debug_assertions, track_caller)]
    fn to_gif_frame(f: GIFFrame) -> CatResult<gif::Frame<'static>> {
        let GIFFrame { image, pal, delay, transparent_index } = f;

        let (buffer, width, height) = image.into_contiguous_buf();

        let mut pal_rgb: Vec<u8> = pal.iter().flat_map(|p| [p.r, p.g, p.b]).collect();
        // Palette should be power-of-two sized
        if pal.len() != 256 {
            let needed_size = 3 * pal.len().max(2).next_power_of_two();
            pal_rgb.extend(repeat(0).take(needed_size - pal_rgb.len()));
            debug_assert_eq!(needed_size, pal_rgb.len());
        }

        Ok(gif::Frame {
            delay,
            dispose: gif::DisposalMethod::Background,
            transparent: transparent_index,
            width: u16::try_from(width)?,
            height: u16::try_from(height)?,
            palette: Some(pal_rgb),
            buffer: buffer.into(),
            ..gif::Frame::default()
        })
    }

    pub fn write_frame(&mut self, f: GIFFrame) -> CatResult<()> {
        let frame = Self::to_gif_frame(f)?;

        let enc = match self.gif_enc {
            None => {
                let w = CountingWriter {
                    writer: self.writer.take().ok_or(crate::Error::ThreadSend)?,
                    written: self.written.clone(),
                };
                let mut enc = gif::Encoder::new(w, frame.width, frame.height, &[])?;
                enc.set_repeat(self.repeat)?;
                enc.write_raw_extension(gif::Extension::Comment.into(), &[b"gifcrop"])?;
                self.gif_enc.get_or_insert(enc)
            },
            Some(ref mut enc) => enc,
        };

        enc.write_frame(&frame)?;
        Ok(())
    }

    /// Writes the trailer
    pub fn finish(&mut self) -> CatResult<()> {
        if let Some(enc) = self.gif_enc.take() {
            let mut w = enc.into_inner()?;
            w.flush()?;
        }
        Ok(())
    }
}
