//! Fixed-interval retry policy used when reconnecting to the broker or store.

use std::time::Duration;

/// How often, and how many times, a failed connection is retried.
///
/// `max_attempts` counts every attempt including the first one. `None`
/// retries forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Retries forever, sleeping `interval` between attempts.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    /// Gives up after `max_attempts` attempts.
    pub fn bounded(max_attempts: u32, interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts.max(1)),
        }
    }

    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self::bounded(1, Duration::ZERO)
    }

    /// Returns true if another attempt may follow `attempts_made` failed ones.
    pub fn allows(&self, attempts_made: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts_made < max,
            None => true,
        }
    }

    /// Sleeps for the retry interval.
    pub async fn pause(&self) {
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::bounded(10, Duration::from_millis(500))
    }
}
