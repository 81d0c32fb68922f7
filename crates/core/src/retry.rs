//! Bounded retry with exponential backoff and jitter.
//!
//! Wraps any fallible async operation. Every failure is retried
//! uniformly; no attempt is made to distinguish retryable transport
//! errors from remote rejections. Jitter spreads concurrently retried
//! sub-jobs apart so they do not hammer the remote service in lockstep.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Retry budget for one wrapped operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Must be at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Convenience constructor.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }
}

/// Returned once the retry budget is spent; carries the final failure.
#[derive(Debug, thiserror::Error)]
#[error("retries exhausted after {attempts} attempts: {source}")]
pub struct ExhaustedRetries<E: std::error::Error + 'static> {
    /// How many attempts were made.
    pub attempts: u32,
    /// The error from the last attempt.
    #[source]
    pub source: E,
}

/// Run `op` until it succeeds or the policy's budget is spent.
///
/// The delay before retry `n` (counting from 0) is
/// `base_delay * 2^n + jitter`, jitter uniform in `[0, base_delay)`.
/// `what` names the operation in retry logs.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, ExhaustedRetries<E>>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    tracing::error!(what, attempts = attempt, error = %err, "Retries exhausted");
                    return Err(ExhaustedRetries {
                        attempts: attempt,
                        source: err,
                    });
                }
                let delay = backoff_delay(policy.base_delay, attempt - 1);
                tracing::warn!(
                    what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Exponential delay with uniform jitter in `[0, base)`.
fn backoff_delay(base: Duration, retry_index: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    let exp = base_ms.saturating_mul(1u64 << retry_index.min(16));
    let jitter = if base_ms > 0 {
        rand::rng().random_range(0..base_ms)
    } else {
        0
    };
    Duration::from_millis(exp + jitter)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
