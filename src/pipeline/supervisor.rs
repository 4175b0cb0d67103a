use anyhow::{anyhow, Result};
use std::thread;
use std::time::Duration;

/// Bounded restart with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based): doubles each time,
    /// capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .checked_mul(1u32 << shift)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// `op` receives the 1-based attempt number. The final error carries the
/// attempt count and the last failure.
pub fn run_with_retry<T>(policy: &RetryPolicy, mut op: impl FnMut(u32) -> Result<T>) -> Result<T> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("pipeline started after {attempt} attempts");
                }
                return Ok(value);
            }
            Err(err) if attempt >= max_attempts => {
                tracing::error!("giving up after {attempt} attempts: {err:#}");
                return Err(anyhow!("failed after {attempt} attempts: {err:#}"));
            }
            Err(err) => {
                let backoff = policy.backoff_for(attempt);
                tracing::warn!(
                    "attempt {attempt}/{max_attempts} failed: {err:#}; retrying in {} ms",
                    backoff.as_millis()
                );
                thread::sleep(backoff);
                attempt += 1;
            }
        }
    }
}
