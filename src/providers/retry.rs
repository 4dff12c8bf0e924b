use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::context::RequestContext;
use crate::core::error::Result;

/// Retries transient failures with exponential backoff plus random jitter.
///
/// Retry `n` (1-based) waits `2^n * base_delay + jitter`, where jitter is
/// drawn uniformly from `0..=max_jitter`. Only errors reporting
/// [`is_transient`](crate::core::error::RateError::is_transient) are
/// retried; everything else is returned immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_jitter: Duration,
}

impl RetryPolicy {
    /// # Parameters
    /// - `max_retries`: retries after the first attempt (total runs = 1 + retries)
    /// - `base_delay`: multiplied by `2^n` for retry `n`
    /// - `max_jitter`: upper bound of the random extra delay
    pub fn new(max_retries: u32, base_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_jitter,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry `retry` without jitter.
    pub fn base_backoff(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }

    /// Delay before retry `retry`, jitter included. Saturates instead of
    /// overflowing for extreme settings.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.base_backoff(retry).saturating_add(jitter)
    }

    /// Runs `operation` until it succeeds, fails with a non-transient
    /// error, or the retry budget is spent.
    pub async fn run<F, Fut, T>(&self, ctx: &RequestContext, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Ok(val) => return Ok(val),
                Err(err) if !err.is_transient() => {
                    debug!(correlation_id = %ctx, error = %err, "Not retrying non-transient error");
                    return Err(err);
                }
                Err(err) => {
                    if retry >= self.max_retries {
                        warn!(
                            correlation_id = %ctx,
                            error = %err,
                            "Giving up after {} retries", retry
                        );
                        return Err(err);
                    }
                    retry += 1;
                    let delay = self.backoff_delay(retry);
                    warn!(
                        correlation_id = %ctx,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Attempt failed, retry {}/{}", retry, self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_millis(100))
    }
}
