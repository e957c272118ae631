//! Bounded retry with backoff for operations that cross the network.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

/// Longest wait between two attempts, whatever the backoff factor.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(600);

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub delay: Duration,
    /// Multiplier applied to the delay after each retry. `1.0` is a fixed delay.
    pub factor: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, factor: f64) -> Self {
        Self {
            max_attempts,
            delay,
            factor,
        }
    }

    /// Delay before retry number `retry` (1-indexed), capped at [`MAX_RETRY_DELAY`].
    pub fn delay_before(&self, retry: u32) -> Duration {
        if self.delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.delay.as_secs_f64() * self.factor.max(1.0).powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }
}

impl Default for RetryPolicy {
    /// Five attempts, 10s initial delay growing by 1.2x.
    fn default() -> Self {
        Self::new(5, Duration::from_secs(10), 1.2)
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` is exhausted.
///
/// `op` receives the 1-indexed attempt number. The last error is returned
/// with context naming the operation and the number of attempts made.
pub fn retry<T, F>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => {
                return Err(err.context(format!(
                    "{label}: giving up after {max_attempts} attempt(s)"
                )));
            }
            Err(err) => {
                let delay = policy.delay_before(attempt);
                warn!(attempt, max_attempts, "{label} failed: {err:#}");
                debug!(delay_ms = delay.as_millis() as u64, "sleeping before retry");
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                attempt += 1;
            }
        }
    }
}
