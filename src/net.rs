//! Loading images and videos from http(s) URLs

use crate::error::{CatResult, Error};
use crate::input::{check_size, image_from_bytes, ImageInput, MediaKind, VideoFormat, VideoInput};
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::io::Read;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(30);
const Y4M_MAGIC: &[u8] = b"YUV4MPEG2";

#[must_use]
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn client() -> CatResult<Client> {
    let builder = Client::builder().timeout(TIMEOUT);
    #[cfg(test)]
    let builder = builder.no_proxy();
    Ok(builder.build()?)
}

/// Fetches a GIF.
///
/// The server must say it's a GIF. If it doesn't, or the request fails, the URL is fetched
/// once more without any expectations and the body is accepted if it looks like any
/// supported image. If that fails too, the first error is reported.
pub fn fetch_image(url: &str) -> CatResult<ImageInput> {
    let client = client()?;
    match fetch_gif(&client, url) {
        Ok(input) => Ok(input),
        Err(first_err) => {
            log::warn!("direct fetch of {url} failed ({first_err}); retrying as a plain image");
            fetch_any_image(&client, url).map_err(|retry_err| {
                log::debug!("plain image fetch failed too: {retry_err}");
                match first_err {
                    Error::OversizeInput(..) | Error::Network(_) => first_err,
                    other => Error::Network(other.to_string()),
                }
            })
        },
    }
}

fn fetch_gif(client: &Client, url: &str) -> CatResult<ImageInput> {
    let res = checked_get(client.get(url).header(ACCEPT, "image/gif,image/*,*/*").send()?)?;
    let content_type = res.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default().to_owned();
    if !content_type.to_ascii_lowercase().contains("image/gif") {
        return Err(Error::InvalidInputFormat(format!("The URL is not a GIF file (it's {})",
            if content_type.is_empty() { "of unknown type" } else { content_type.as_str() })));
    }
    let data = read_body(res, MediaKind::Image)?;
    image_from_bytes(data, Some(&content_type))
}

fn fetch_any_image(client: &Client, url: &str) -> CatResult<ImageInput> {
    let res = checked_get(client.get(url).send()?)?;
    let data = read_body(res, MediaKind::Image)?;
    image_from_bytes(data, None)
}

/// What [`fetch_video`] found at a URL
#[derive(Debug)]
pub enum RemoteVideo {
    /// Y4M is decoded from memory, so it's downloaded
    Downloaded(VideoInput),
    /// Anything else is left for the decoder to stream from the URL itself
    Streamed(VideoFormat),
}

/// Checks a video URL, reading only as much of the body as needed to tell what it is.
///
/// The format comes from the header, then the Content-Type, then the URL's extension.
pub fn fetch_video(url: &str) -> CatResult<RemoteVideo> {
    let res = checked_get(client()?.get(url).send()?)?;
    if let Some(len) = res.content_length() {
        check_size(MediaKind::Video, len)?;
    }
    let declared = res.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).and_then(VideoFormat::from_mime);

    let mut body = res.take(MediaKind::Video.max_bytes() + 1);
    let mut data = Vec::with_capacity(Y4M_MAGIC.len());
    body.by_ref().take(Y4M_MAGIC.len() as u64).read_to_end(&mut data)?;
    if data.starts_with(Y4M_MAGIC) {
        body.read_to_end(&mut data)?;
        check_size(MediaKind::Video, data.len() as u64)?;
        return Ok(RemoteVideo::Downloaded(VideoInput { data, format: VideoFormat::Y4m }));
    }

    let path = url.split(&['?', '#'][..]).next().unwrap_or(url);
    let format = declared.or_else(|| VideoFormat::from_extension(std::path::Path::new(path)))
        .ok_or_else(VideoFormat::unsupported)?;
    if format == VideoFormat::Y4m {
        return Err(Error::Decode("The URL doesn't contain a valid Y4M stream".into()));
    }
    log::debug!("{url} is {format:?}, leaving it to the decoder");
    Ok(RemoteVideo::Streamed(format))
}

fn checked_get(res: Response) -> CatResult<Response> {
    let status = res.status();
    if !status.is_success() {
        return Err(Error::Network(format!("HTTP {status}")));
    }
    Ok(res)
}

/// Refuses oversized bodies from the Content-Length, and again while reading in case it lied
fn read_body(res: Response, kind: MediaKind) -> CatResult<Vec<u8>> {
    if let Some(len) = res.content_length() {
        check_size(kind, len)?;
    }
    let mut data = Vec::new();
    res.take(kind.max_bytes() + 1).read_to_end(&mut data)?;
    check_size(kind, data.len() as u64)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ImageFormat;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";

    fn response(status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
        let mut res = format!("HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", body.len()).into_bytes();
        res.extend_from_slice(body);
        res
    }

    /// Answers each connection with the next response, and returns the URL of `path`
    fn serve(path: &str, responses: Vec<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/{path}", listener.local_addr().unwrap());
        thread::spawn(move || {
            for res in responses {
                let Ok((mut stream, _)) = listener.accept() else { return };
                let mut req = Vec::new();
                let mut buf = [0; 1024];
                while !req.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => req.extend_from_slice(&buf[..n]),
                    }
                }
                // the client may hang up early on purpose
                let _ = stream.write_all(&res);
            }
        });
        url
    }

    #[test]
    fn recognizes_urls() {
        assert!(is_url("https://example.com/a.gif"));
        assert!(is_url("http://example.com/a.gif"));
        assert!(!is_url("/tmp/a.gif"));
        assert!(!is_url("ftp://example.com/a.gif"));
    }

    #[test]
    fn gif() {
        let url = serve("cat.gif", vec![response("200 OK", "image/gif", GIF)]);
        let input = fetch_image(&url).unwrap();
        assert_eq!(input.format, ImageFormat::Gif);
        assert_eq!(input.data, GIF);
    }

    #[test]
    fn wrong_content_type_falls_back_to_plain_fetch() {
        let url = serve("cat", vec![
            response("200 OK", "text/html", GIF),
            response("200 OK", "text/html", GIF),
        ]);
        let input = fetch_image(&url).unwrap();
        assert_eq!(input.format, ImageFormat::Gif);
    }

    #[test]
    fn first_error_is_reported() {
        let url = serve("cat.gif", vec![
            response("404 Not Found", "text/html", b"nope"),
            response("200 OK", "text/html", b"<html></html>"),
        ]);
        let res = fetch_image(&url);
        assert!(matches!(&res, Err(Error::Network(msg)) if msg.contains("404")), "{res:?}");
    }

    #[test]
    fn oversize_content_length() {
        let huge = format!("HTTP/1.1 200 OK\r\nContent-Type: image/gif\r\nContent-Length: {}\r\nConnection: close\r\n\r\nGIF89a", crate::input::MAX_IMAGE_BYTES + 1);
        let url = serve("big.gif", vec![huge.clone().into_bytes(), huge.into_bytes()]);
        let res = fetch_image(&url);
        assert!(matches!(res, Err(Error::OversizeInput(_, _))), "{res:?}");
    }

    #[test]
    fn y4m_is_downloaded() {
        let y4m = b"YUV4MPEG2 W1 H1 F10:1 C444\nFRAME\n\x80\x80\x80";
        let url = serve("clip", vec![response("200 OK", "application/octet-stream", y4m)]);
        match fetch_video(&url).unwrap() {
            RemoteVideo::Downloaded(video) => {
                assert_eq!(video.format, VideoFormat::Y4m);
                assert_eq!(video.data, y4m);
            },
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn other_videos_are_streamed() {
        let url = serve("clip.webm?t=1", vec![response("200 OK", "application/octet-stream", &[0x1A, 0x45, 0xDF, 0xA3, 0, 0, 0, 0, 0, 0, 0, 0])]);
        assert!(matches!(fetch_video(&url).unwrap(), RemoteVideo::Streamed(VideoFormat::WebM)));

        let url = serve("clip", vec![response("200 OK", "video/mp4", &[0; 64])]);
        assert!(matches!(fetch_video(&url).unwrap(), RemoteVideo::Streamed(VideoFormat::Mp4)));
    }

    #[test]
    fn oversize_video() {
        let huge = format!("HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", crate::input::MAX_VIDEO_BYTES + 1);
        let url = serve("big.mp4", vec![huge.into_bytes()]);
        assert!(matches!(fetch_video(&url), Err(Error::OversizeInput(_, _))));
    }
}
