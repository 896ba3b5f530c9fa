//! Looping animation playback

use crate::frame::Frame;
use std::ops::ControlFlow;
use std::time::Duration;

/// Which frame is showing, and whether it's moving on by itself
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Playback {
    index: usize,
    len: usize,
    playing: bool,
}

impl Playback {
    /// Starts playing from the first frame
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self { index: 0, len, playing: true }
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> usize {
        self.index
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Single frames don't animate
    #[inline]
    #[must_use]
    pub fn is_animated(&self) -> bool {
        self.len > 1
    }

    /// Moves to the next frame, wrapping around to 0 after the last one
    pub fn advance(&mut self) -> usize {
        if self.len > 0 {
            self.index = (self.index + 1) % self.len;
        }
        self.index
    }

    /// Out-of-range indices are ignored
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.index = index;
        true
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn resume(&mut self) {
        self.playing = true;
    }

    pub fn toggle(&mut self) -> bool {
        self.playing = !self.playing;
        self.playing
    }
}

/// How the player waits between frames
pub trait Clock {
    fn wait(&mut self, delay: Duration);
}

/// Waits by sleeping the current thread
pub struct ThreadClock;

impl Clock for ThreadClock {
    fn wait(&mut self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Timer loop that shows frames one after another.
///
/// It runs on the caller's thread and never overlaps with itself: the next frame is
/// rendered only after the previous frame's delay has passed.
pub struct Player<'frames, C> {
    frames: &'frames [Frame],
    playback: Playback,
    clock: C,
}

impl<'frames, C: Clock> Player<'frames, C> {
    pub fn new(frames: &'frames [Frame], clock: C) -> Self {
        Self {
            frames,
            playback: Playback::new(frames.len()),
            clock,
        }
    }

    #[must_use]
    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut Playback {
        &mut self.playback
    }

    /// Renders the current frame, advances, waits that frame's delay, and repeats.
    ///
    /// Returns when `render` breaks, which pauses playback, or after rendering once if
    /// there's nothing to animate. Call again to resume from the frame after the last one shown.
    pub fn run<B>(&mut self, mut render: impl FnMut(usize, &Frame) -> ControlFlow<B>) -> Option<B> {
        self.playback.resume();
        loop {
            let index = self.playback.current();
            let frame = self.frames.get(index)?;
            if let ControlFlow::Break(b) = render(index, frame) {
                self.playback.pause();
                return Some(b);
            }
            if !self.playback.is_animated() {
                self.playback.pause();
                return None;
            }
            self.playback.advance();
            self.clock.wait(Duration::from_millis(frame.delay_ms.into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::ImgVec;
    use rgb::RGBA8;

    struct FakeClock(Vec<Duration>);
    impl Clock for &mut FakeClock {
        fn wait(&mut self, delay: Duration) {
            self.0.push(delay);
        }
    }

    fn frames(delays: &[u32]) -> Vec<Frame> {
        delays.iter().map(|&d| Frame::new(ImgVec::new(vec![RGBA8::default(); 1], 1, 1), d)).collect()
    }

    #[test]
    fn wraps_after_n_advances() {
        for n in 1..10 {
            let mut p = Playback::new(n);
            for _ in 0..n - 1 {
                assert_ne!(p.advance(), 0);
            }
            assert_eq!(p.advance(), 0);
        }
    }

    #[test]
    fn select_and_toggle() {
        let mut p = Playback::new(3);
        assert!(p.is_playing());
        assert!(!p.select(3));
        assert!(p.select(2));
        assert_eq!(p.current(), 2);
        assert!(!p.toggle());
        assert!(p.toggle());
    }

    #[test]
    fn player_renders_in_order_and_waits_each_delay() {
        let frames = frames(&[10, 20, 30]);
        let mut clock = FakeClock(vec![]);
        let mut player = Player::new(&frames, &mut clock);
        let mut shown = vec![];
        let stopped_at = player.run(|i, _| {
            shown.push(i);
            if shown.len() == 5 { ControlFlow::Break(i) } else { ControlFlow::Continue(()) }
        });
        assert_eq!(stopped_at, Some(1));
        assert_eq!(shown, [0, 1, 2, 0, 1]);
        assert!(!player.playback().is_playing());
        assert_eq!(player.playback().current(), 1);
        drop(player);
        assert_eq!(clock.0, [10, 20, 30, 10].map(Duration::from_millis));
    }

    #[test]
    fn resume_continues_from_current() {
        let frames = frames(&[10, 10, 10]);
        let mut clock = FakeClock(vec![]);
        let mut player = Player::new(&frames, &mut clock);
        player.run(|_, _| ControlFlow::Break(()));
        player.playback_mut().advance();
        let mut first = None;
        player.run(|i, _| {
            first = Some(i);
            ControlFlow::Break(())
        });
        assert_eq!(first, Some(1));
    }

    #[test]
    fn single_frame_renders_once() {
        let frames = frames(&[100]);
        let mut clock = FakeClock(vec![]);
        let mut player = Player::new(&frames, &mut clock);
        let mut count = 0;
        let res: Option<()> = player.run(|_, _| {
            count += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(res, None);
        assert_eq!(count, 1);
    }
}
