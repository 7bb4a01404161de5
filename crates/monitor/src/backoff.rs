//! Retry delays.

use std::time::Duration;

/// Bounded exponential backoff: the delay before retry `k` (1-based) is
/// `2^(k-1) * base`, and at most `max_retries` retries follow a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    max_retries: u32,
}

impl BackoffPolicy {
    /// Policy starting at `base` and allowing `max_retries` retries.
    pub fn new(base: Duration, max_retries: u32) -> Self {
        Self { base, max_retries }
    }

    /// Delay to wait after a failure when `retries_so_far` retries have
    /// already been made, or `None` once the budget is spent.
    pub fn delay_for(&self, retries_so_far: u32) -> Option<Duration> {
        if retries_so_far >= self.max_retries {
            return None;
        }
        let factor = 1u32.checked_shl(retries_so_far).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor))
    }

    /// Retry budget.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}
