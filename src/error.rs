use std::io;
use std::num::TryFromIntError;
use quick_error::quick_error;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// Internal error
        ThreadSend {
            display("Internal error; unexpectedly aborted")
        }
        Aborted {
            display("aborted")
        }
        /// A newer sampling run was started
        Superseded {
            display("Sampling was superseded by a newer run")
        }
        NoFrames {
            display("Found no usable frames to encode")
        }
        /// Nothing arrived from the frame source in time (e.g. a video seek never completed)
        Timeout(secs: f64) {
            display("No frame arrived within {secs}s; the source appears to be stuck")
        }
        InvalidInputFormat(msg: String) {
            display("{}", msg)
        }
        OversizeInput(size: u64, limit: u64) {
            display("Input is {} bytes, which exceeds the limit of {} MB", size, limit / (1024 * 1024))
        }
        Network(msg: String) {
            display("Unable to fetch the URL: {}", msg)
        }
        Decode(msg: String) {
            display("{}", msg)
        }
        InvalidTimeRange(start: f64, end: f64) {
            display("Start time ({start}s) must be before end time ({end}s)")
        }
        InvalidSettings(msg: String) {
            display("{}", msg)
        }
        CropOutOfBounds {
            display("The crop region lies outside of the frame")
        }
        Gif(err: gif::EncodingError) {
            display("GIF encoding error: {}", err)
        }
        GifDecode(err: gif::DecodingError) {
            from()
            display("GIF decoding error: {}", err)
        }
        Io(err: io::Error) {
            from()
            from(_oom: std::collections::TryReserveError) -> (io::ErrorKind::OutOfMemory.into())
            display("I/O: {}", err)
        }
        PNG(msg: String) {
            display("{}", msg)
        }
        WrongSize(msg: String) {
            display("{}", msg)
            from(e: TryFromIntError) -> (e.to_string())
            from(e: resize::Error) -> (e.to_string())
        }
        Quant(liq: imagequant::Error) {
            from()
            display("pngquant error: {}", liq)
        }
        Pal(gif: gif_dispose::Error) {
            from()
            display("gif dispose error: {}", gif)
        }
    }
}

pub type CatResult<T, E = Error> = Result<T, E>;

impl Error {
    /// Errors caused by the user's input rather than by the tool itself.
    ///
    /// These are shown as a notice and leave the previous state intact.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(self,
            Self::InvalidInputFormat(_) | Self::OversizeInput(..) | Self::Network(_) |
            Self::Decode(_) | Self::InvalidTimeRange(..) | Self::InvalidSettings(_) |
            Self::CropOutOfBounds | Self::GifDecode(_) | Self::PNG(_))
    }
}

impl From<gif::EncodingError> for Error {
    #[cold]
    fn from(err: gif::EncodingError) -> Self {
        match err {
            gif::EncodingError::Io(err) => err.into(),
            other => Error::Gif(other),
        }
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for Error {
    #[cold]
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        Self::ThreadSend
    }
}

impl From<crossbeam_channel::RecvError> for Error {
    #[cold]
    fn from(_: crossbeam_channel::RecvError) -> Self {
        Self::Aborted
    }
}

#[cfg(feature = "url")]
impl From<reqwest::Error> for Error {
    #[cold]
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

#[cfg(feature = "y4m")]
impl From<y4m::Error> for Error {
    #[cold]
    fn from(err: y4m::Error) -> Self {
        match err {
            y4m::Error::IoError(err) => err.into(),
            other => Self::Decode(format!("Bad Y4M stream: {other:?}")),
        }
    }
}

#[cfg(feature = "video")]
impl From<ffmpeg::Error> for Error {
    #[cold]
    fn from(err: ffmpeg::Error) -> Self {
        Self::Decode(format!("Video decoding failed: {err}"))
    }
}
