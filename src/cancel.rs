//! Letting a new sampling run supersede one that is still in progress

use crate::error::{CatResult, Error};
use std::sync::atomic::{AtomicU64, Ordering::SeqCst};
use std::sync::Arc;

/// Hands out [`RunToken`]s. Starting a run invalidates every earlier token.
#[derive(Clone, Debug, Default)]
pub struct RunTokens {
    generation: Arc<AtomicU64>,
}

/// Held by a sampling run and checked before each step
#[derive(Clone, Debug)]
pub struct RunToken {
    generation: Arc<AtomicU64>,
    id: u64,
}

impl RunTokens {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> RunToken {
        let id = self.generation.fetch_add(1, SeqCst) + 1;
        RunToken { generation: self.generation.clone(), id }
    }

    /// Invalidates the current run without starting another one
    pub fn cancel_all(&self) {
        self.generation.fetch_add(1, SeqCst);
    }
}

impl RunToken {
    #[inline]
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.generation.load(SeqCst) == self.id
    }

    #[inline]
    pub fn check(&self) -> CatResult<()> {
        if self.is_current() { Ok(()) } else { Err(Error::Superseded) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_run_supersedes() {
        let runs = RunTokens::new();
        let first = runs.begin();
        assert!(first.check().is_ok());
        let second = runs.begin();
        assert!(matches!(first.check(), Err(Error::Superseded)));
        assert!(second.is_current());
        runs.cancel_all();
        assert!(!second.is_current());
    }
}
