use crate::error::{CatResult, Error};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::iter::FusedIterator;
use std::time::Duration;

/// Sending half. Items can arrive in any order; they come out sorted by index.
pub struct OrdQueue<T> {
    sender: Sender<Indexed<T>>,
}

impl<T> Clone for OrdQueue<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone() }
    }
}

pub struct OrdQueueIter<T> {
    receiver: Receiver<Indexed<T>>,
    next_index: usize,
    pending: BinaryHeap<Indexed<T>>,
    timeout: Option<Duration>,
    failed: bool,
}

/// `depth` bounds how far the producer can run ahead of the consumer
pub fn new<T>(depth: usize, timeout: Option<Duration>) -> (OrdQueue<T>, OrdQueueIter<T>) {
    from_channel(crossbeam_channel::bounded(depth), timeout)
}

/// For collecting everything in memory on one thread
pub fn unbounded<T>() -> (OrdQueue<T>, OrdQueueIter<T>) {
    from_channel(crossbeam_channel::unbounded(), None)
}

fn from_channel<T>((sender, receiver): (Sender<Indexed<T>>, Receiver<Indexed<T>>), timeout: Option<Duration>) -> (OrdQueue<T>, OrdQueueIter<T>) {
    (OrdQueue {
        sender,
    }, OrdQueueIter {
        receiver,
        next_index: 0,
        pending: BinaryHeap::new(),
        timeout,
        failed: false,
    })
}

impl<T: Send + 'static> OrdQueue<T> {
    #[inline]
    pub fn push(&self, index: usize, item: T) -> CatResult<()> {
        self.sender.send(Indexed(index, item))?;
        Ok(())
    }
}

impl<T> OrdQueueIter<T> {
    fn recv(&self) -> Option<CatResult<Indexed<T>>> {
        match self.timeout {
            None => self.receiver.recv().ok().map(Ok),
            Some(timeout) => match self.receiver.recv_timeout(timeout) {
                Ok(item) => Some(Ok(item)),
                Err(RecvTimeoutError::Disconnected) => None,
                Err(RecvTimeoutError::Timeout) => Some(Err(Error::Timeout(timeout.as_secs_f64()))),
            },
        }
    }
}

impl<T> FusedIterator for OrdQueueIter<T> {}

/// Yields items with consecutive indices starting at 0.
///
/// Ends when all senders are gone. If a gap in indices is never filled,
/// the buffered items after it are still returned in order.
impl<T> Iterator for OrdQueueIter<T> {
    type Item = CatResult<T>;

    #[inline(never)]
    fn next(&mut self) -> Option<CatResult<T>> {
        if self.failed {
            return None;
        }
        while self.pending.peek().map(|i| i.0) != Some(self.next_index) {
            match self.recv() {
                Some(Ok(item)) => self.pending.push(item),
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                },
                // Sender dropped (but continue to dump pending items)
                None => break,
            }
        }

        let item = self.pending.pop()?;
        self.next_index = item.0 + 1;
        Some(Ok(item.1))
    }
}

/// Min-heap ordering by index
struct Indexed<T>(usize, T);
impl<T> PartialEq for Indexed<T> {
    #[inline]
    fn eq(&self, o: &Self) -> bool { o.0.eq(&self.0) }
}
impl<T> Eq for Indexed<T> {}
impl<T> PartialOrd for Indexed<T> {
    #[inline]
    fn partial_cmp(&self, o: &Self) -> Option<Ordering> { Some(self.cmp(o)) }
}
impl<T> Ord for Indexed<T> {
    #[inline]
    fn cmp(&self, o: &Self) -> Ordering { o.0.cmp(&self.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorders() {
        let (q, iter) = new(8, None);
        for i in [2, 0, 3, 1] {
            q.push(i, i * 10).unwrap();
        }
        drop(q);
        let out: Vec<_> = iter.map(|r| r.unwrap()).collect();
        assert_eq!(out, [0, 10, 20, 30]);
    }

    #[test]
    fn stalled_sender_times_out() {
        let (q, mut iter) = new::<u8>(1, Some(Duration::from_millis(20)));
        q.push(0, 7).unwrap();
        assert_eq!(iter.next().unwrap().unwrap(), 7);
        assert!(matches!(iter.next(), Some(Err(Error::Timeout(_)))));
        assert!(iter.next().is_none());
        drop(q);
    }
}
