//! YUV4MPEG2 streams, as written by `ffmpeg -f yuv4mpegpipe`

use super::{Video, VideoInfo};
use crate::error::{CatResult, Error};
use imgref::{ImgRef, ImgVec};
use rgb::RGBA8;
use std::io::Read;
use y4m::Colorspace;
use yuv::color::{MatrixCoefficients, Range};
use yuv::convert::RGBConvert;
use yuv::YUV;

/// Whole stream decoded to RGBA up front, so seeking is just picking a frame.
///
/// Inputs are size-limited before they get here, so keeping every frame is affordable.
pub struct Y4mVideo {
    frames: Vec<ImgVec<RGBA8>>,
    frame_time: f64,
    width: usize,
    height: usize,
    position: usize,
}

enum Samp {
    Mono,
    S1x1,
    S2x1,
    S2x2,
}

impl Y4mVideo {
    pub fn new<R: Read>(reader: R) -> CatResult<Self> {
        let mut decoder = y4m::Decoder::new(reader)?;
        let width = decoder.get_width();
        let height = decoder.get_height();
        if width == 0 || width > u16::MAX as _ || height == 0 || height > u16::MAX as _ {
            return Err(Error::Decode("Video too large".into()));
        }
        let fps = decoder.get_framerate();
        if fps.num == 0 || fps.den == 0 {
            return Err(Error::Decode("Y4M has no frame rate".into()));
        }
        let frame_time = fps.den as f64 / fps.num as f64;

        let raw_params_str = String::from_utf8_lossy(decoder.get_raw_params()).into_owned();
        let range = raw_params_str.split_once("COLORRANGE=").map(|(_, r)| {
            if r.starts_with("LIMIT") { Range::Limited } else { Range::Full }
        });
        let sd_or_hd = if height <= 480 && width <= 720 { MatrixCoefficients::BT601 } else { MatrixCoefficients::BT709 };

        let (samp, range, matrix) = match decoder.get_colorspace() {
            Colorspace::Cmono => (Samp::Mono, range.unwrap_or(Range::Full), MatrixCoefficients::Identity),
            Colorspace::C420 => (Samp::S2x2, range.unwrap_or(Range::Limited), MatrixCoefficients::BT601),
            Colorspace::C420jpeg => (Samp::S2x2, range.unwrap_or(Range::Full), MatrixCoefficients::BT601),
            Colorspace::C420paldv => (Samp::S2x2, range.unwrap_or(Range::Limited), MatrixCoefficients::BT601),
            Colorspace::C420mpeg2 => (Samp::S2x2, range.unwrap_or(Range::Limited), sd_or_hd),
            Colorspace::C422 => (Samp::S2x1, range.unwrap_or(Range::Limited), sd_or_hd),
            Colorspace::C444 => (Samp::S1x1, range.unwrap_or(Range::Full), MatrixCoefficients::BT709),
            _ => return Err(Error::Decode(format!("Y4M uses unsupported color mode {raw_params_str}"))),
        };
        let limited = matches!(range, Range::Limited);
        let conv = RGBConvert::<u8>::new(range, matrix)
            .map_err(|_| Error::Decode(format!("Y4M color conversion unsupported ({raw_params_str})")))?;

        let bad_frame = || Error::Decode(format!("Bad Y4M frame (using {raw_params_str})"));

        let mut frames = Vec::new();
        loop {
            let frame = match decoder.read_frame() {
                Ok(frame) => frame,
                Err(y4m::Error::EOF) => break,
                Err(e) => return Err(e.into()),
            };
            let y = frame.get_y_plane();
            let u = frame.get_u_plane();
            let v = frame.get_v_plane();
            if y.len() < width * height || u.len() != v.len() {
                return Err(bad_frame());
            }

            let mut out = Vec::new();
            out.try_reserve(width * height)?;
            let rows = y.chunks_exact(width).take(height);
            match samp {
                Samp::Mono => {
                    out.extend(y[..width * height].iter().map(|&l| {
                        let l = (if limited { (i32::from(l).clamp(16, 235) - 16) * 255 / 219 } else { i32::from(l) }) as u8;
                        RGBA8::new(l, l, l, 255)
                    }));
                },
                Samp::S1x1 => {
                    let u = u.chunks_exact(width);
                    let v = v.chunks_exact(width);
                    for (y, (u, v)) in rows.zip(u.zip(v)) {
                        out.extend(y.iter().copied().zip(u.iter().copied().zip(v.iter().copied()))
                            .map(|(y, (u, v))| conv.to_rgb(YUV {y, u, v}).with_alpha(255)));
                    }
                },
                Samp::S2x1 => {
                    let u = u.chunks_exact((width + 1) / 2);
                    let v = v.chunks_exact((width + 1) / 2);
                    for (y, (u, v)) in rows.zip(u.zip(v)) {
                        let u = u.iter().copied().flat_map(|x| [x, x]);
                        let v = v.iter().copied().flat_map(|x| [x, x]);
                        out.extend(y.iter().copied().zip(u.zip(v))
                            .map(|(y, (u, v))| conv.to_rgb(YUV {y, u, v}).with_alpha(255)));
                    }
                },
                Samp::S2x2 => {
                    let u = u.chunks_exact((width + 1) / 2).flat_map(|r| [r, r]);
                    let v = v.chunks_exact((width + 1) / 2).flat_map(|r| [r, r]);
                    for (y, (u, v)) in rows.zip(u.zip(v)) {
                        let u = u.iter().copied().flat_map(|x| [x, x]);
                        let v = v.iter().copied().flat_map(|x| [x, x]);
                        out.extend(y.iter().copied().zip(u.zip(v))
                            .map(|(y, (u, v))| conv.to_rgb(YUV {y, u, v}).with_alpha(255)));
                    }
                },
            }
            if out.len() != width * height {
                return Err(bad_frame());
            }
            frames.push(ImgVec::new(out, width, height));
        }
        if frames.is_empty() {
            return Err(Error::Decode("The Y4M stream has no frames".into()));
        }
        log::debug!("decoded {} Y4M frames, {width}×{height}, {:.3}s each", frames.len(), frame_time);

        Ok(Self {
            frames,
            frame_time,
            width,
            height,
            position: 0,
        })
    }
}

impl Video for Y4mVideo {
    fn info(&self) -> VideoInfo {
        VideoInfo {
            duration: self.frames.len() as f64 * self.frame_time,
            width: self.width,
            height: self.height,
        }
    }

    fn seek(&mut self, time: f64) -> CatResult<()> {
        if !time.is_finite() || time < 0. {
            return Err(Error::Decode(format!("Can't seek to {time}s")));
        }
        let index = (time / self.frame_time + 1e-9).floor() as usize;
        self.position = index.min(self.frames.len() - 1);
        Ok(())
    }

    fn picture(&self) -> CatResult<ImgRef<'_, RGBA8>> {
        self.frames.get(self.position).map(|f| f.as_ref()).ok_or(Error::NoFrames)
    }
}
