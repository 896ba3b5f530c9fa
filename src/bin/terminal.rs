//! Draws frames in a terminal with 24-bit color "▀" cells, two pixel rows per line

use gifcrop::Frame;
use std::fmt::Write as _;
use std::io::{self, Write};

use crate::BinResult;

pub struct Terminal<W> {
    out: W,
    columns: usize,
    line: String,
}

impl<W: Write> Terminal<W> {
    pub fn new(out: W, columns: usize) -> Self {
        Self { out, columns: columns.max(1), line: String::new() }
    }

    /// Frames are scaled down to fit the width, keeping the aspect ratio
    pub fn fit(&self, frame: &Frame) -> BinResult<Frame> {
        if frame.width() <= self.columns {
            return Ok(frame.clone());
        }
        let height = (frame.height() * self.columns / frame.width()).max(1);
        Ok(frame.resized(self.columns, height)?)
    }

    pub fn clear(&mut self) -> io::Result<()> {
        self.out.write_all(b"\x1b[2J\x1b[?25l")
    }

    pub fn draw(&mut self, frame: &Frame, status: &str) -> io::Result<()> {
        self.line.clear();
        self.line.push_str("\x1b[H");
        let rows: Vec<_> = frame.image.rows().collect();
        for pair in rows.chunks(2) {
            let top = pair[0];
            let bottom = pair.get(1).copied();
            for (x, t) in top.iter().enumerate() {
                let b = bottom.map_or(*t, |row| row[x]);
                let _ = write!(self.line, "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m▀", t.r, t.g, t.b, b.r, b.g, b.b);
            }
            self.line.push_str("\x1b[0m\n");
        }
        self.line.push_str(status);
        self.line.push_str("\x1b[K");
        self.out.write_all(self.line.as_bytes())?;
        self.out.flush()
    }

    pub fn restore(&mut self) -> io::Result<()> {
        self.out.write_all(b"\x1b[0m\x1b[?25h\n")?;
        self.out.flush()
    }
}
