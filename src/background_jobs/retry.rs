//! Retry policy for failed job runs.
//!
//! The scheduler, not the job, owns retry timing: after a retryable failure
//! the next attempt is scheduled on a bounded exponential backoff, and once
//! the retry budget is exhausted the job falls back to its regular interval.

use crate::config::JobSettings;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of backoff-spaced re-attempts after a failure.
    pub max_retries: u32,
    /// Backoff before the first re-attempt, in seconds.
    pub initial_backoff_secs: u64,
    /// Cap for exponential growth, in seconds.
    pub max_backoff_secs: u64,
    /// Multiplier applied per re-attempt.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(settings: &JobSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff_secs: settings.initial_backoff_secs,
            max_backoff_secs: settings.max_backoff_secs,
            backoff_multiplier: settings.backoff_multiplier,
        }
    }

    /// Backoff before attempt number `retry_count` (0-based):
    /// `initial_backoff * multiplier^retry_count`, capped.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let secs =
            self.initial_backoff_secs as f64 * self.backoff_multiplier.powi(retry_count as i32);
        Duration::from_secs(secs.min(self.max_backoff_secs as f64) as u64)
    }

    /// Whether another backoff-spaced attempt is allowed.
    pub fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 6,
            initial_backoff_secs: 60,
            max_backoff_secs: 3600, // the scan interval itself is an hour
            backoff_multiplier: 2.0,
        }
    }
}
