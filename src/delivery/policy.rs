//! Retry policy for webhook delivery.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default minimum spacing between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Exponential backoff stops doubling after this many steps.
const MAX_BACKOFF_SHIFT: u32 = 6;

/// How the delay grows between retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Every retry waits the base delay.
    #[default]
    Fixed,
    /// Retry `n` waits `delay * 2^(n-1)`, capped at `delay * 64`.
    Exponential,
}

/// Bounded retry schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Minimum spacing between attempts.
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_retries,
            delay,
            backoff,
        }
    }

    /// Total attempts including the first one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt is allowed after `attempts` have been made.
    #[must_use]
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts()
    }

    /// Wait before retry number `retry` (1-based). Never less than `delay`.
    #[must_use]
    pub fn delay_before(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let shift = retry.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
                self.delay.saturating_mul(1 << shift)
            }
        }
    }
}

/// Whether an HTTP status warrants another attempt.
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    (500..600).contains(&status)
}
