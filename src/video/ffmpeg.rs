use super::{Video, VideoInfo};
use crate::error::{CatResult, Error};
use ffmpeg::util::frame::video::Video as VideoFrame;
use imgref::{ImgRef, ImgVec};
use rgb::{FromSlice, RGBA8};

/// Any file or URL FFmpeg can open.
///
/// Decoding only goes forward, which is all the sampler needs: it seeks to increasing times.
pub struct FfmpegVideo {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::decoder::Video,
    converter: ffmpeg::software::scaling::Context,
    time_base: f64,
    info: VideoInfo,
    current: Option<(f64, ImgVec<RGBA8>)>,
    pending: Option<(f64, ImgVec<RGBA8>)>,
    eof: bool,
}

// SAFETY: the FFmpeg contexts are owned exclusively and only used through `&mut self`,
// so moving them to another thread is fine.
unsafe impl Send for FfmpegVideo {}

impl FfmpegVideo {
    pub fn open(path_or_url: &str) -> CatResult<Self> {
        ffmpeg::init()?;
        let input = ffmpeg::format::input(&path_or_url)
            .map_err(|e| Error::Decode(format!("Unable to open video {path_or_url}: {e}")))?;

        let (stream_index, decoder, time_base, stream_duration) = {
            let stream = input.streams().best(ffmpeg::media::Type::Video)
                .ok_or_else(|| Error::Decode("The file has no video tracks".into()))?;
            let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
            let decoder = context.decoder().video()
                .map_err(|e| Error::Decode(format!("Unable to decode the codec used in the video: {e}")))?;
            let tb = stream.time_base();
            let time_base = f64::from(tb.numerator()) / f64::from(tb.denominator());
            (stream.index(), decoder, time_base, stream.duration())
        };
        let converter = decoder.converter(ffmpeg::util::format::pixel::Pixel::RGBA)?;

        let duration = if input.duration() > 0 {
            input.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        } else {
            stream_duration as f64 * time_base
        };
        let info = VideoInfo {
            duration,
            width: decoder.width() as usize,
            height: decoder.height() as usize,
        };
        log::debug!("opened {path_or_url}: {}×{}, {:.2}s", info.width, info.height, info.duration);

        Ok(Self {
            input,
            stream_index,
            decoder,
            converter,
            time_base,
            info,
            current: None,
            pending: None,
            eof: false,
        })
    }

    fn decode_next(&mut self) -> CatResult<Option<(f64, ImgVec<RGBA8>)>> {
        let mut vid_frame = VideoFrame::empty();
        loop {
            if self.decoder.receive_frame(&mut vid_frame).is_ok() && vid_frame.width() > 0 {
                let mut rgba_frame = VideoFrame::empty();
                self.converter.run(&vid_frame, &mut rgba_frame)?;

                let stride = rgba_frame.stride(0) / 4;
                let image = ImgVec::new_stride(
                    rgba_frame.data(0).as_rgba().to_owned(),
                    rgba_frame.width() as usize,
                    rgba_frame.height() as usize,
                    stride,
                );
                let pts = vid_frame.timestamp().or(vid_frame.pts()).unwrap_or(0);
                return Ok(Some((pts as f64 * self.time_base, image)));
            }
            if self.eof {
                return Ok(None);
            }

            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder.send_packet(&packet)?;
                    }
                },
                Err(ffmpeg::Error::Eof) => {
                    self.eof = true;
                    self.decoder.send_eof()?;
                },
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Video for FfmpegVideo {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn seek(&mut self, time: f64) -> CatResult<()> {
        const SLACK: f64 = 1e-6;
        if let Some((current_pts, _)) = &self.current {
            if time + SLACK < *current_pts {
                return Err(Error::Decode(format!("Can't seek backwards to {time}s")));
            }
        }
        loop {
            if self.pending.is_none() {
                self.pending = self.decode_next()?;
            }
            match &self.pending {
                Some((pts, _)) if *pts <= time + SLACK || self.current.is_none() => {
                    self.current = self.pending.take();
                },
                _ => break,
            }
        }
        if self.current.is_none() {
            return Err(Error::NoFrames);
        }
        Ok(())
    }

    fn picture(&self) -> CatResult<ImgRef<'_, RGBA8>> {
        self.current.as_ref().map(|(_, img)| img.as_ref()).ok_or(Error::NoFrames)
    }
}
