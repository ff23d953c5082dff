//! Cooperative cancellation, checked once per smoothing pass.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A source of cancellation requests polled between passes.
pub trait CancelToken {
    /// Whether the run should stop before the next pass.
    fn is_cancelled(&self) -> bool;
}

/// A token that never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A shared flag another part of the program can raise.
#[derive(Debug, Default, Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A new, unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl CancelToken for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Cancels when a sentinel file exists, for driving from a shell.
#[derive(Debug, Clone)]
pub struct SentinelFileCancel {
    path: PathBuf,
}

impl SentinelFileCancel {
    /// Watch `path`; its mere existence requests cancellation.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CancelToken for SentinelFileCancel {
    fn is_cancelled(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_cancel() {
        assert!(!NeverCancel.is_cancelled());
    }

    #[test]
    fn test_flag_cancels_after_raise() {
        let flag = CancelFlag::new();
        let watcher = flag.clone();
        assert!(!watcher.is_cancelled());
        flag.cancel();
        assert!(watcher.is_cancelled());
    }

    #[test]
    fn test_sentinel_file_absent() {
        let token = SentinelFileCancel::new("/nonexistent/halt");
        assert!(!token.is_cancelled());
    }
}
