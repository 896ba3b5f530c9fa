//! For tracking conversion progress and aborting early

/// A trait that is used to report progress to some consumer.
pub trait ProgressReporter: Send {
    /// Called after each frame has been written.
    ///
    /// This method may return `false` to abort processing.
    fn increase(&mut self) -> bool;

    /// File size so far
    fn written_bytes(&mut self, _current_file_size_in_bytes: u64) {}

    /// Writing is done when `Writer::write()` call returns
    fn done(&mut self, _msg: &str) {}
}

/// No-op progress reporter
pub struct NoProgress {}

impl ProgressReporter for NoProgress {
    fn increase(&mut self) -> bool {
        true
    }
}

/// Stops after a given number of frames, e.g. when the user pressed cancel
pub struct FrameLimit {
    remaining: u64,
}

impl FrameLimit {
    #[must_use]
    pub fn new(frames: u64) -> Self {
        Self { remaining: frames }
    }
}

impl ProgressReporter for FrameLimit {
    fn increase(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Implement the progress reporter trait for a progress bar,
/// to make it usable for frame processing reporting.
#[cfg(feature = "pbr")]
impl<T> ProgressReporter for pbr::ProgressBar<T> where T: std::io::Write + Send {
    fn increase(&mut self) -> bool {
        self.inc();
        true
    }

    fn done(&mut self, msg: &str) {
        self.finish_print(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_limit_counts_down() {
        let mut limit = FrameLimit::new(2);
        assert!(limit.increase());
        assert!(limit.increase());
        assert!(!limit.increase());
    }

    #[cfg(feature = "pbr")]
    #[test]
    fn progress_bar_is_a_reporter() {
        let mut pb = pbr::ProgressBar::on(Vec::new(), 3);
        let reporter: &mut dyn ProgressReporter = &mut pb;
        assert!(reporter.increase());
        reporter.written_bytes(100);
        reporter.done("Done");
    }
}
