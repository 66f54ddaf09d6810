//! Bounded retry with exponential backoff
//!
//! One parameterized helper shared by every flaky call site instead of
//! inlined per-call retry loops. The operation classifies its own failures:
//! retryable, retryable-after-a-server-hint (`Retry-After`), or fatal.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff parameters
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of retries after the initial attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Ceiling for the doubled delay and for server-provided hints
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
        }
    }
}

/// Failure classification returned by a retried operation
#[derive(Debug)]
pub enum Attempt<E> {
    /// Transient failure, retry after the current backoff delay
    Retry(E),
    /// Transient failure with a server-provided delay hint
    RetryAfter(Duration, E),
    /// Permanent failure, stop immediately
    Fatal(E),
}

/// Run `op` until it succeeds, fails fatally, or retries are exhausted
///
/// The delay doubles after each retry, capped at `max_delay`. A
/// [`Attempt::RetryAfter`] hint overrides the computed delay for the next
/// attempt. On exhaustion the last error is returned.
pub async fn retry_with_backoff<T, E, Fut, Op>(policy: &RetryPolicy, mut op: Op) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Attempt<E>>>,
{
    let mut delay = policy.initial_delay;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(policy.max_delay);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(Attempt::Fatal(e)) => return Err(e),
            Err(Attempt::Retry(e)) => {
                if attempt == policy.max_retries {
                    return Err(e);
                }
                warn!(
                    "[Retry] Attempt {}/{} failed, backing off {:?}",
                    attempt + 1,
                    policy.max_retries,
                    delay
                );
            }
            Err(Attempt::RetryAfter(hint, e)) => {
                if attempt == policy.max_retries {
                    return Err(e);
                }
                delay = hint.min(policy.max_delay);
                warn!(
                    "[Retry] Attempt {}/{} failed, server asked to wait {:?}",
                    attempt + 1,
                    policy.max_retries,
                    delay
                );
            }
        }
    }

    // 0..=max_retries always returns from inside the loop
    unreachable!("retry loop exited without a result")
}
