//! Consecutive-failure circuit breaker
//!
//! Tracks the current streak of failed tasks across all workers of one run.
//! A single success resets the streak, so only an uninterrupted run of
//! failures (a ban or an outage of the remote host) can trip it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counter of consecutive task failures
#[derive(Debug)]
pub struct FailureBreaker {
    threshold: u64,
    consecutive: AtomicU64,
}

impl FailureBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: u64::from(threshold.max(1)),
            consecutive: AtomicU64::new(0),
        }
    }

    /// Records one failure and reports whether the threshold is reached
    ///
    /// The increment and the comparison happen in one atomic step, so among
    /// concurrent callers exactly one observes the streak hitting the
    /// threshold. Callers past that point also see `true`.
    pub fn record_failure(&self) -> bool {
        let streak = self.consecutive.fetch_add(1, Ordering::SeqCst) + 1;
        streak >= self.threshold
    }

    /// Resets the streak
    pub fn record_success(&self) {
        self.consecutive.store(0, Ordering::SeqCst);
    }

    /// Current length of the failure streak
    pub fn consecutive(&self) -> u64 {
        self.consecutive.load(Ordering::SeqCst)
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }
}
