use clap::{crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use gifcrop::crop::{CropRegion, OutOfBounds, Size};
use gifcrop::input::{self, ImageInput};
use gifcrop::playback::{Player, ThreadClock};
use gifcrop::progress::{NoProgress, ProgressReporter};
use gifcrop::source::{self, Jitter, Source, StillOptions, VideoSampler};
use gifcrop::video::{SizePolicy, TimeWindow, Video};
use gifcrop::{CropSettings, Repeat, Settings};
use pbr::ProgressBar;

mod terminal;

pub type BinResult<T, E = Box<dyn std::error::Error + Send + Sync>> = Result<T, E>;

use std::env;
use std::fmt;
use std::fs::File;
use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Length of the clip when no end time is given
const DEFAULT_CLIP_SECS: f64 = 3.;

fn main() {
    if let Err(e) = bin_main() {
        eprintln!("error: {e}");
        let mut source = e.source();
        while let Some(e) = source {
            eprintln!("error: {e}");
            source = e.source();
        }
        std::process::exit(1);
    }
}

fn bin_main() -> BinResult<()> {
    let matches = Command::new("gifcrop")
        .version(crate_version!())
        .about("Crop animated GIFs, or turn part of a video into one")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new("crop")
            .about("Crop a GIF (or animate a still PNG)")
            .arg(Arg::new("INPUT")
                .help("GIF or PNG file, or an http(s) URL")
                .required(true))
            .arg(output_arg())
            .args(crop_args())
            .arg(Arg::new("frames")
                .long("frames")
                .value_name("num")
                .value_parser(value_parser!(u16).range(1..))
                .default_value("10")
                .help("Frames to make from a still image"))
            .arg(Arg::new("delay")
                .long("delay")
                .value_name("ms")
                .value_parser(value_parser!(u32).range(1..))
                .default_value("100")
                .help("Delay of frames made from a still image"))
            .arg(Arg::new("wobble")
                .long("wobble")
                .action(ArgAction::SetTrue)
                .help("Slightly rotate and scale frames made from a still image"))
            .args(encode_args()))
        .subcommand(Command::new("convert")
            .about("Sample part of a video into a GIF")
            .arg(Arg::new("VIDEO")
                .help(VIDEO_ARG_HELP)
                .required(true))
            .arg(output_arg())
            .arg(Arg::new("start")
                .long("start")
                .short('s')
                .value_name("sec")
                .value_parser(value_parser!(f64))
                .default_value("0")
                .help("Where the clip starts"))
            .arg(Arg::new("end")
                .long("end")
                .short('e')
                .value_name("sec")
                .value_parser(value_parser!(f64))
                .help("Where the clip ends [default: 3 seconds in, or the end of the video]"))
            .arg(Arg::new("fps")
                .long("fps")
                .short('r')
                .value_name("num")
                .value_parser(value_parser!(f64))
                .default_value("10")
                .help("Frames sampled per second of video"))
            .arg(Arg::new("size")
                .long("size")
                .value_name("original|px")
                .value_parser(parse_size_policy)
                .default_value("original")
                .help("Length of the longer edge of the output, or \"original\""))
            .args(crop_args())
            .arg(Arg::new("timeout")
                .long("timeout")
                .value_name("sec")
                .value_parser(value_parser!(f64))
                .default_value("30")
                .help("Give up if the video doesn't produce a frame for this long"))
            .args(encode_args()))
        .subcommand(Command::new("play")
            .about("Play the (cropped) animation in the terminal")
            .arg(Arg::new("INPUT")
                .help("GIF or PNG file, or an http(s) URL")
                .required(true))
            .args(crop_args())
            .arg(Arg::new("loops")
                .long("loops")
                .value_name("num")
                .value_parser(value_parser!(u32).range(1..))
                .default_value("3")
                .help("How many times to play the animation"))
            .arg(Arg::new("width")
                .long("width")
                .short('W')
                .value_name("columns")
                .value_parser(value_parser!(usize))
                .default_value("80")
                .help("Maximum width in terminal columns")))
        .get_matches_from(wild::args_os());

    match matches.subcommand() {
        Some(("crop", m)) => crop_main(m),
        Some(("convert", m)) => convert_main(m),
        Some(("play", m)) => play_main(m),
        _ => Err("Please specify a command".into()),
    }
}

fn output_arg() -> Arg {
    Arg::new("output")
        .long("output")
        .short('o')
        .help("Destination file to write to; \"-\" means stdout")
        .value_name("a.gif")
        .value_parser(value_parser!(PathBuf))
        .required(true)
}

fn crop_args() -> [Arg; 3] {
    [
        Arg::new("crop")
            .long("crop")
            .short('c')
            .value_name("x,y,w,h")
            .value_parser(parse_crop_region)
            .help("Region to keep, in displayed coordinates"),
        Arg::new("display")
            .long("display")
            .value_name("WxH")
            .value_parser(parse_display_size)
            .requires("crop")
            .help("Size the image was shown at when the region was picked [default: actual size]"),
        Arg::new("clamp")
            .long("clamp")
            .action(ArgAction::SetTrue)
            .requires("crop")
            .help("Move a region that sticks out of the frame inside, instead of failing"),
    ]
}

fn encode_args() -> [Arg; 4] {
    [
        Arg::new("quality")
            .long("quality")
            .short('Q')
            .value_name("1-100")
            .value_parser(value_parser!(u8).range(1..=100))
            .default_value("90")
            .help("Lower quality may give smaller file"),
        Arg::new("fast")
            .long("fast")
            .action(ArgAction::SetTrue)
            .help("Faster encoding, but worse quality and larger file size"),
        Arg::new("repeat")
            .long("repeat")
            .value_name("num")
            .value_parser(value_parser!(i16))
            .allow_negative_numbers(true)
            .help("Number of times the animation is repeated (-1 none, 0 forever or <value> repetitions)"),
        Arg::new("quiet")
            .long("quiet")
            .short('q')
            .action(ArgAction::SetTrue)
            .help("Do not display anything on standard output/console"),
    ]
}

#[cfg(feature = "video")]
const VIDEO_ARG_HELP: &str = "Video file supported by FFmpeg, a Y4M file, or an http(s) URL";
#[cfg(not(feature = "video"))]
const VIDEO_ARG_HELP: &str = "Y4M video file (yuv4mpegpipe), or an http(s) URL";

fn init_logging(quiet: bool) {
    let default_level = if quiet { "error" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn crop_main(matches: &ArgMatches) -> BinResult<()> {
    let output_path = DestPath::new(matches.get_one::<PathBuf>("output").ok_or("Missing output")?);
    let quiet = matches.get_flag("quiet") || output_path == DestPath::Stdout;
    init_logging(quiet);

    let input = load_image(matches.get_one::<String>("INPUT").ok_or("Missing input")?)?;
    let still = StillOptions {
        frames: matches.get_one::<u16>("frames").copied().map_or(source::DEFAULT_STILL_FRAMES, usize::from),
        delay_ms: matches.get_one::<u32>("delay").copied().unwrap_or(gifcrop::frame::DEFAULT_DELAY_MS),
        jitter: if matches.get_flag("wobble") { Jitter::Wobble } else { Jitter::None },
    };
    if !quiet && input.format == input::ImageFormat::Png {
        eprintln!("warning: the input is a still image; its {} frames will all be the same picture", still.frames);
    }
    let source = input.into_source(still)?;

    let settings = Settings {
        crop: crop_settings(matches),
        ..encode_settings(matches)?
    };
    encode_to(source, settings, &output_path, quiet)
}

fn convert_main(matches: &ArgMatches) -> BinResult<()> {
    let output_path = DestPath::new(matches.get_one::<PathBuf>("output").ok_or("Missing output")?);
    let quiet = matches.get_flag("quiet") || output_path == DestPath::Stdout;
    init_logging(quiet);

    let fps = matches.get_one::<f64>("fps").copied().ok_or("Missing fps")?;
    if !quiet && fps > 50. && fps <= gifcrop::video::MAX_FPS {
        eprintln!("warning: web browsers support max 50 fps");
    }
    let start = matches.get_one::<f64>("start").copied().unwrap_or(0.);
    let end = matches.get_one::<f64>("end").copied();
    let size = matches.get_one::<SizePolicy>("size").copied().unwrap_or_default();
    let timeout = matches.get_one::<f64>("timeout").copied().ok_or("Missing timeout")?;
    if !(timeout.is_finite() && timeout > 0.) {
        return Err("Timeout must be a positive number of seconds".into());
    }

    let video = open_video(matches.get_one::<String>("VIDEO").ok_or("Missing video")?)?;
    let window = match end {
        Some(end) => TimeWindow::new(start, end)?,
        None if start == 0. => TimeWindow::leading(DEFAULT_CLIP_SECS, video.info().duration)?,
        None => TimeWindow::new(start, start + DEFAULT_CLIP_SECS)?,
    };
    let sampler = VideoSampler::new(video, window, fps, size)?;

    let settings = Settings {
        crop: crop_settings(matches),
        frame_timeout: Some(Duration::from_secs_f64(timeout)),
        ..encode_settings(matches)?
    };
    encode_to(Box::new(sampler), settings, &output_path, quiet)
}

fn play_main(matches: &ArgMatches) -> BinResult<()> {
    init_logging(false);
    let input = load_image(matches.get_one::<String>("INPUT").ok_or("Missing input")?)?;
    let mut source = input.into_source(StillOptions::default())?;
    let frames = source::collect_all(&mut *source)?;

    let settings = Settings {
        crop: crop_settings(matches),
        ..Settings::default()
    };
    let columns = matches.get_one::<usize>("width").copied().unwrap_or(80);
    let loops = matches.get_one::<u32>("loops").copied().unwrap_or(1);
    let total_ms = gifcrop::frame::total_duration_ms(&frames);

    let mut term = terminal::Terminal::new(io::stdout().lock(), columns);
    let frames = frames.into_iter()
        .map(|f| term.fit(&settings.prepare(f)?))
        .collect::<BinResult<Vec<_>>>()?;

    term.clear()?;
    let mut player = Player::new(&frames, ThreadClock);
    let mut loops_left = loops;
    let res = player.run(|index, frame| {
        if index == 0 {
            if loops_left == 0 {
                return ControlFlow::Break(Ok(()));
            }
            loops_left -= 1;
        }
        let status = format!("frame {}/{} ({}ms of {}ms)", index + 1, frames.len(), frame.delay_ms, total_ms);
        match term.draw(frame, &status) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => ControlFlow::Break(Err(e)),
        }
    });
    term.restore()?;
    res.transpose()?;
    Ok(())
}

fn encode_settings(matches: &ArgMatches) -> BinResult<Settings> {
    let quality = matches.get_one::<u8>("quality").copied().unwrap_or(90);
    if quality < 20 && !matches.get_flag("quiet") {
        eprintln!("warning: quality {quality} will give really bad results");
    }
    let repeat = match matches.get_one::<i16>("repeat").copied().unwrap_or(0) {
        -1 => Repeat::Finite(0),
        0 => Repeat::Infinite,
        n if n > 0 => Repeat::Finite(n as u16),
        _ => return Err("Invalid repeat count".into()),
    };
    Ok(Settings {
        quality,
        fast: matches.get_flag("fast"),
        repeat,
        ..Settings::default()
    })
}

fn crop_settings(matches: &ArgMatches) -> Option<CropSettings> {
    let region = matches.get_one::<CropRegion>("crop").copied()?;
    Some(CropSettings {
        region,
        displayed: matches.get_one::<Size>("display").copied(),
        policy: if matches.get_flag("clamp") { OutOfBounds::Clamp } else { OutOfBounds::Skip },
    })
}

fn encode_to(source: Box<dyn Source>, settings: Settings, output_path: &DestPath<'_>, quiet: bool) -> BinResult<()> {
    let mut pb;
    let mut nopb = NoProgress {};
    let progress: &mut dyn ProgressReporter = if quiet {
        &mut nopb
    } else {
        pb = ProgressBar::new(source.total_frames().unwrap_or(0));
        pb.show_speed = false;
        pb.show_percent = false;
        pb.format(" #_. ");
        pb.message("Frame ");
        pb.set_max_refresh_rate(Some(Duration::from_millis(250)));
        &mut pb
    };

    match output_path {
        DestPath::Path(p) => {
            let file = File::create(p)
                .map_err(|e| format!("Can't write to {}: {}", p.display(), e))?;
            gifcrop::encode(source, settings, file, progress)?;
        },
        DestPath::Stdout => {
            gifcrop::encode(source, settings, io::stdout().lock(), progress)?;
        },
    };
    progress.done(&format!("gifcrop created {output_path}"));
    Ok(())
}

fn load_image(input: &str) -> BinResult<ImageInput> {
    #[cfg(feature = "url")]
    if gifcrop::net::is_url(input) {
        return Ok(gifcrop::net::fetch_image(input)?);
    }
    let path = Path::new(input);
    check_if_path_exists(path)?;
    Ok(input::read_image_file(path)?)
}

fn open_video(input: &str) -> BinResult<Box<dyn Video>> {
    #[cfg(feature = "url")]
    if gifcrop::net::is_url(input) {
        return match gifcrop::net::fetch_video(input)? {
            gifcrop::net::RemoteVideo::Downloaded(video) => y4m_video(&video.data),
            gifcrop::net::RemoteVideo::Streamed(_) => get_video_decoder(input),
        };
    }
    let path = Path::new(input);
    check_if_path_exists(path)?;
    if path.extension().map_or(false, |e| e.eq_ignore_ascii_case("y4m")) || is_y4m_file(path)? {
        let video = input::read_video_file(path)?;
        return y4m_video(&video.data);
    }
    input::check_video_file(path)?;
    get_video_decoder(input)
}

fn is_y4m_file(path: &Path) -> BinResult<bool> {
    use std::io::Read;
    let mut buf = [0; 9];
    let mut file = File::open(path)?;
    Ok(file.read_exact(&mut buf).is_ok() && &buf == b"YUV4MPEG2")
}

fn y4m_video(data: &[u8]) -> BinResult<Box<dyn Video>> {
    Ok(Box::new(gifcrop::video::Y4mVideo::new(data)?))
}

#[cfg(feature = "video")]
fn get_video_decoder(path_or_url: &str) -> BinResult<Box<dyn Video>> {
    Ok(Box::new(gifcrop::video::FfmpegVideo::open(path_or_url)?))
}

#[cfg(not(feature = "video"))]
#[cold]
fn get_video_decoder(_: &str) -> BinResult<Box<dyn Video>> {
    Err(r"Video support is disabled in this executable, so only Y4M input works.

To enable video decoding you need to recompile gifcrop from source with:
cargo build --release --features=video

Alternatively, convert the video with:
ffmpeg -i video.mp4 -f yuv4mpegpipe video.y4m
".into())
}

fn check_if_path_exists(path: &Path) -> BinResult<()> {
    if !path.exists() {
        let mut msg = format!("Unable to find the input file: \"{}\"", path.display());
        if path.is_relative() {
            msg += &format!(" (searched in \"{}\")", env::current_dir()?.display());
        }
        return Err(msg.into());
    }
    Ok(())
}

fn parse_crop_region(s: &str) -> Result<CropRegion, String> {
    let parts = s.split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("{e}"))?;
    match parts[..] {
        [x, y, w, h] if parts.iter().all(|v| v.is_finite()) && w > 0. && h > 0. => Ok(CropRegion::new(x, y, w, h)),
        _ => Err("expected x,y,width,height with a positive width and height".into()),
    }
}

fn parse_display_size(s: &str) -> Result<Size, String> {
    let (w, h) = s.split_once(|c| c == 'x' || c == 'X').ok_or("expected WIDTHxHEIGHT")?;
    let w: f64 = w.trim().parse().map_err(|e| format!("{e}"))?;
    let h: f64 = h.trim().parse().map_err(|e| format!("{e}"))?;
    if !(w > 0. && h > 0. && w.is_finite() && h.is_finite()) {
        return Err("the size must be positive".into());
    }
    Ok(Size::new(w, h))
}

fn parse_size_policy(s: &str) -> Result<SizePolicy, String> {
    s.parse().map_err(|e: gifcrop::Error| e.to_string())
}

#[derive(PartialEq)]
enum DestPath<'a> {
    Path(&'a Path),
    Stdout,
}

impl<'a> DestPath<'a> {
    pub fn new(path: &'a Path) -> Self {
        if path.as_os_str() == "-" {
            Self::Stdout
        } else {
            Self::Path(path)
        }
    }
}

impl fmt::Display for DestPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Path(orig_path) => {
                let abs_path = dunce::canonicalize(orig_path);
                abs_path.as_ref().map(|p| p.as_path()).unwrap_or(orig_path).display().fmt(f)
            },
            Self::Stdout => f.write_str("stdout"),
        }
    }
}
