//! Bounded retry for rate limited collaborator calls
//!
//! Only rate limiting is retried. Every other failure is returned to the
//! caller on the first attempt.

use crate::config::RetryConfig;
use std::time::Duration;
use tracing::debug;

/// Errors that can say whether they were caused by rate limiting
pub trait RateLimited {
    fn is_rate_limited(&self) -> bool;
}

/// Attempts and exponential backoff between them
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            multiplier: cfg.multiplier.max(1.0),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Wait before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.saturating_sub(1) as i32);
        self.initial_backoff.mul_f64(factor)
    }

    /// Run `call` until it succeeds, fails for a reason other than rate
    /// limiting, or runs out of attempts.
    pub fn run<T, E, F>(&self, mut call: F) -> Result<T, E>
    where
        E: RateLimited,
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            match call() {
                Err(e) if e.is_rate_limited() && attempt < self.max_attempts => {
                    let wait = self.backoff(attempt);
                    debug!(attempt, wait_ms = wait.as_millis() as u64, "rate limited, backing off");
                    std::thread::sleep(wait);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
