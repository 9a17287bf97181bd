//! Exponential backoff between retry attempts.

use std::time::Duration;

/// Computes the delay before the next attempt: `base * 2^attempt`,
/// capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(10))
    }
}

impl Backoff {
    /// Creates a backoff policy. A `max` below `base` is raised to `base`.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    /// The delay after the first failed attempt.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// The upper bound on any delay.
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Delay to wait after the given 0-based attempt failed.
    ///
    /// Saturates at `max` instead of overflowing for large attempts.
    pub fn delay(&self, attempt: u32) -> Duration {
        1u32.checked_shl(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}
