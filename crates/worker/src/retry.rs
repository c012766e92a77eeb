//! Retry policy for delivery attempts.
//!
//! The first attempt runs immediately; each later attempt waits for the next
//! entry of `delays`. When there are more attempts than delays the last delay
//! is reused.

use std::time::Duration;

use notifier_common::config::AppConfig;
use notifier_common::error::AppError;

/// Attempts 1 + 3 retries waiting 10s, 40s and 90s.
const DEFAULT_DELAYS_SECS: [u64; 3] = [10, 40, 90];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delays: Vec<Duration>) -> Result<Self, AppError> {
        if max_attempts == 0 {
            return Err(AppError::Config(
                "retry policy needs at least one attempt".to_string(),
            ));
        }
        if max_attempts > 1 && delays.is_empty() {
            return Err(AppError::Config(format!(
                "{} attempts configured but no retry delays",
                max_attempts
            )));
        }
        Ok(Self {
            max_attempts,
            delays,
        })
    }

    /// A single attempt, no retries.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            delays: Vec::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(
            config.retry_max_attempts,
            config
                .retry_delays_secs
                .iter()
                .copied()
                .map(Duration::from_secs)
                .collect(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before `attempt` (1-based). `None` for the first attempt.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt <= 1 {
            return None;
        }
        let idx = (attempt - 2) as usize;
        self.delays
            .get(idx)
            .or_else(|| self.delays.last())
            .copied()
    }

    /// Sum of all waits between the first and the last attempt.
    pub fn total_backoff(&self) -> Duration {
        (2..=self.max_attempts)
            .filter_map(|attempt| self.delay_before(attempt))
            .sum()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_DELAYS_SECS.len() as u32 + 1,
            delays: DEFAULT_DELAYS_SECS
                .iter()
                .copied()
                .map(Duration::from_secs)
                .collect(),
        }
    }
}
