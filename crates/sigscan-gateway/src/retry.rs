//! Bounded retry with exponential backoff.
//!
//! Only errors classified retryable by [`GatewayError::is_retryable`] are
//! retried; auth and data-unavailable errors fail immediately.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{GatewayError, Result};

/// Backoff policy for transient gateway errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling for the doubled delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling and capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, exhausts attempts, or fails permanently.
///
/// A `RateLimited` error's `retry_after_ms` hint overrides the computed
/// backoff when it is longer.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let mut delay = policy.delay_for(attempt);
                if let GatewayError::RateLimited { retry_after_ms } = &err {
                    delay = delay.max(Duration::from_millis(*retry_after_ms));
                }
                debug!(
                    label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying gateway call"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if attempt > 1 {
                    warn!(label, attempt, error = %err, "Gateway call failed after retries");
                }
                return Err(err);
            }
        }
    }
}
