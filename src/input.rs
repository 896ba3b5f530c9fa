//! Checking user-supplied files before any decoding is attempted

use crate::error::{CatResult, Error};
use crate::source::{GifSource, Source, StillOptions, StillSource};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Images larger than this are rejected
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
/// Videos larger than this are rejected
pub const MAX_VIDEO_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    #[must_use]
    pub fn max_bytes(self) -> u64 {
        match self {
            Self::Image => MAX_IMAGE_BYTES,
            Self::Video => MAX_VIDEO_BYTES,
        }
    }
}

/// Fails with [`Error::OversizeInput`] if `len` is over the limit for this kind of media
pub fn check_size(kind: MediaKind, len: u64) -> CatResult<()> {
    let limit = kind.max_bytes();
    if len > limit {
        return Err(Error::OversizeInput(len, limit));
    }
    Ok(())
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Gif,
    Png,
}

impl ImageFormat {
    /// Looks at the file signature
    pub fn sniff(data: &[u8]) -> CatResult<Self> {
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Ok(Self::Gif);
        }
        if data.starts_with(b"\x89PNG") {
            return Ok(Self::Png);
        }
        if data.starts_with(&[0xFF, 0xD8]) {
            return Err(Error::InvalidInputFormat("JPEG images are not supported; please use a GIF or PNG file".into()));
        }
        Err(Error::InvalidInputFormat("Not a valid GIF file".into()))
    }

    /// Parameters like `; charset=` are ignored
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime_essence(mime).as_str() {
            "image/gif" => Some(Self::Gif),
            "image/png" | "image/apng" => Some(Self::Png),
            _ => None,
        }
    }

    #[must_use]
    pub fn from_extension(path: &Path) -> Option<Self> {
        match extension(path)?.as_str() {
            "gif" => Some(Self::Gif),
            "png" | "apng" => Some(Self::Png),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VideoFormat {
    Mp4,
    QuickTime,
    Avi,
    WebM,
    Y4m,
}

impl VideoFormat {
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime_essence(mime).as_str() {
            "video/mp4" => Some(Self::Mp4),
            "video/quicktime" | "video/mov" => Some(Self::QuickTime),
            "video/x-msvideo" | "video/avi" | "video/msvideo" => Some(Self::Avi),
            "video/webm" => Some(Self::WebM),
            "video/x-yuv4mpeg" | "video/yuv4mpeg" => Some(Self::Y4m),
            _ => None,
        }
    }

    #[must_use]
    pub fn from_extension(path: &Path) -> Option<Self> {
        match extension(path)?.as_str() {
            "mp4" | "m4v" => Some(Self::Mp4),
            "mov" => Some(Self::QuickTime),
            "avi" => Some(Self::Avi),
            "webm" => Some(Self::WebM),
            "y4m" => Some(Self::Y4m),
            _ => None,
        }
    }

    pub(crate) fn unsupported() -> Error {
        Error::InvalidInputFormat("Unsupported video format (MP4, MOV, AVI, WebM or Y4M expected)".into())
    }
}

fn mime_essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn extension(path: &Path) -> Option<String> {
    path.extension()?.to_str().map(|e| e.to_ascii_lowercase())
}

/// Validated image bytes, not decoded yet
#[derive(Clone, Debug)]
pub struct ImageInput {
    pub data: Vec<u8>,
    pub format: ImageFormat,
}

impl ImageInput {
    /// GIFs are decoded frame by frame; a PNG becomes a [`StillSource`]
    pub fn into_source(self, still: StillOptions) -> CatResult<Box<dyn Source>> {
        Ok(match self.format {
            ImageFormat::Gif => Box::new(GifSource::new(self.data)?),
            ImageFormat::Png => Box::new(StillSource::from_png(&self.data, still)?),
        })
    }
}

/// Checks the size and the declared type, then the signature.
///
/// A declared MIME type that isn't an image is rejected; a missing one is fine.
pub fn image_from_bytes(data: Vec<u8>, declared_mime: Option<&str>) -> CatResult<ImageInput> {
    check_size(MediaKind::Image, data.len() as u64)?;
    if let Some(mime) = declared_mime {
        if ImageFormat::from_mime(mime).is_none() {
            return Err(Error::InvalidInputFormat(format!("Expected a GIF file, got {mime}")));
        }
    }
    let format = ImageFormat::sniff(&data)?;
    Ok(ImageInput { data, format })
}

/// The file's size is checked before it's read
pub fn read_image_file(path: &Path) -> CatResult<ImageInput> {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if ImageFormat::from_extension(path).is_none() {
            return Err(Error::InvalidInputFormat(format!("\"{ext}\" files are not supported; please use a GIF file")));
        }
    }
    let data = read_limited(path, MediaKind::Image)?;
    image_from_bytes(data, None)
}

/// Validated video bytes, not decoded yet
#[derive(Clone, Debug)]
pub struct VideoInput {
    pub data: Vec<u8>,
    pub format: VideoFormat,
}

/// Y4M files are recognized by their header; everything else by extension
pub fn read_video_file(path: &Path) -> CatResult<VideoInput> {
    let data = read_limited(path, MediaKind::Video)?;
    let format = if data.starts_with(b"YUV4MPEG2") {
        VideoFormat::Y4m
    } else {
        VideoFormat::from_extension(path).ok_or_else(VideoFormat::unsupported)?
    };
    Ok(VideoInput { data, format })
}

/// Checks the size of a video file without reading it
pub fn check_video_file(path: &Path) -> CatResult<VideoFormat> {
    check_size(MediaKind::Video, std::fs::metadata(path)?.len())?;
    VideoFormat::from_extension(path).ok_or_else(VideoFormat::unsupported)
}

fn read_limited(path: &Path, kind: MediaKind) -> CatResult<Vec<u8>> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    check_size(kind, len)?;
    let mut data = Vec::new();
    data.try_reserve(len as usize)?;
    // the file could grow between the check and the read
    file.take(kind.max_bytes() + 1).read_to_end(&mut data)?;
    check_size(kind, data.len() as u64)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIF_HEADER: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";

    #[test]
    fn limits() {
        assert!(check_size(MediaKind::Image, MAX_IMAGE_BYTES).is_ok());
        assert!(matches!(check_size(MediaKind::Image, 10 * 1024 * 1024 + 1), Err(Error::OversizeInput(_, MAX_IMAGE_BYTES))));
        assert!(check_size(MediaKind::Video, 10 * 1024 * 1024 + 1).is_ok());
        assert!(matches!(check_size(MediaKind::Video, MAX_VIDEO_BYTES + 1), Err(Error::OversizeInput(..))));
    }

    #[test]
    fn oversize_is_rejected_before_sniffing() {
        let mut data = vec![0u8; MAX_IMAGE_BYTES as usize + 1];
        data[..GIF_HEADER.len()].copy_from_slice(GIF_HEADER);
        assert!(matches!(image_from_bytes(data, Some("image/gif")), Err(Error::OversizeInput(..))));
    }

    #[test]
    fn oversize_file_is_rejected_before_reading() {
        let path = std::env::temp_dir().join(format!("gifcrop-oversize-{}.gif", std::process::id()));
        let file = File::create(&path).unwrap();
        file.set_len(MAX_IMAGE_BYTES + 1).unwrap();
        drop(file);
        let res = read_image_file(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(res, Err(Error::OversizeInput(n, _)) if n == MAX_IMAGE_BYTES + 1));
    }

    #[test]
    fn sniffs_formats() {
        assert_eq!(ImageFormat::sniff(GIF_HEADER).unwrap(), ImageFormat::Gif);
        assert_eq!(ImageFormat::sniff(b"\x89PNG\r\n\x1a\n").unwrap(), ImageFormat::Png);
        assert!(matches!(ImageFormat::sniff(&[0xFF, 0xD8, 0xFF]), Err(Error::InvalidInputFormat(_))));
        assert!(matches!(ImageFormat::sniff(b"hello"), Err(Error::InvalidInputFormat(_))));
    }

    #[test]
    fn mime_types() {
        assert_eq!(ImageFormat::from_mime("image/gif"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::from_mime("Image/GIF; charset=binary"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::from_mime("text/html"), None);
        assert_eq!(VideoFormat::from_mime("video/mov"), Some(VideoFormat::QuickTime));
        assert_eq!(VideoFormat::from_mime("video/avi"), Some(VideoFormat::Avi));
        assert_eq!(VideoFormat::from_mime("video/x-matroska"), None);
        assert!(matches!(image_from_bytes(GIF_HEADER.to_vec(), Some("text/html")), Err(Error::InvalidInputFormat(_))));
    }

    #[test]
    fn extensions() {
        assert_eq!(ImageFormat::from_extension(Path::new("a/B.GIF")), Some(ImageFormat::Gif));
        assert_eq!(VideoFormat::from_extension(Path::new("clip.webm")), Some(VideoFormat::WebM));
        assert_eq!(VideoFormat::from_extension(Path::new("clip")), None);
        assert!(matches!(read_image_file(Path::new("photo.jpg")), Err(Error::InvalidInputFormat(_))));
    }
}
