//! Monotonic version counter shared by the state store and the harness.

use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out strictly increasing versions, each exactly once.
///
/// Lock-free, so allocating a version never waits on plan application.
#[derive(Debug)]
pub struct VersionCounter {
    next: AtomicU64,
}

impl VersionCounter {
    /// A counter whose first issued version is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first.max(1)),
        }
    }

    /// Issue the next version.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The most recently issued version, or 0 if none has been issued.
    pub fn latest(&self) -> u64 {
        self.next.load(Ordering::SeqCst) - 1
    }
}

impl Default for VersionCounter {
    fn default() -> Self {
        Self::new()
    }
}
