//! Retry helpers with exponential backoff.
//!
//! The schedule is fixed: the wait after failed attempt `n` (zero-based) is
//! `base_delay_ms * 2^n`. With the default 1000 ms base that gives 1 s, 2 s,
//! 4 s, ... Retry decisions come from [`crate::classify`], never from the
//! error's own retry hint. The last error is returned unchanged.

use crate::{Classify, ErrorEnvelope, RequestContext, Result};
use std::future::Future;
use std::time::Duration;

/// Default maximum attempts (including the first try).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts (including the first try). Zero behaves as one.
    pub max_attempts: u32,
    /// Base delay for backoff in milliseconds.
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    /// Policy with the default base delay and the given attempt ceiling.
    #[must_use]
    pub const fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }

    /// Attempt ceiling with the zero case folded into a single attempt.
    #[must_use]
    pub const fn effective_max_attempts(self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }

    /// Delay to wait after the failed attempt with zero-based `attempt_index`.
    #[must_use]
    pub fn backoff_delay(self, attempt_index: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt_index).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Retry `op` up to `max_attempts` times using the default 1000 ms base.
///
/// Works with any error type that can be classified; the final error is
/// returned exactly as the operation produced it.
pub async fn retry_with_backoff<T, E, F, Fut>(mut op: F, max_attempts: u32) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
{
    let policy = RetryPolicy::with_max_attempts(max_attempts);
    let max_attempts = policy.effective_max_attempts();
    let mut attempt_index = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !should_retry(&error, attempt_index, max_attempts) {
                    return Err(error);
                }
                tokio::time::sleep(policy.backoff_delay(attempt_index)).await;
                attempt_index = attempt_index.saturating_add(1);
            },
        }
    }
}

/// Retry a fallible async operation, honoring request cancellation.
pub async fn retry_async<T, F, Fut>(
    ctx: &RequestContext,
    policy: RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_async_with_observer(ctx, policy, operation, &mut op, |_, _, _| {}).await
}

/// Retry with a callback invoked before each backoff sleep.
///
/// The observer receives the one-based attempt that just failed, the delay
/// about to be applied and the error.
pub async fn retry_async_with_observer<T, F, Fut, Obs>(
    ctx: &RequestContext,
    policy: RetryPolicy,
    operation: &'static str,
    op: &mut F,
    mut on_retry: Obs,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    Obs: FnMut(u32, Duration, &ErrorEnvelope),
{
    let max_attempts = policy.effective_max_attempts();
    let mut attempt_index = 0u32;

    loop {
        ctx.ensure_not_cancelled(operation)?;

        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !should_retry(&error, attempt_index, max_attempts) {
                    return Err(error);
                }

                let delay = policy.backoff_delay(attempt_index);
                on_retry(attempt_index.saturating_add(1), delay, &error);
                sleep_with_cancellation(ctx, delay, operation).await?;
                attempt_index = attempt_index.saturating_add(1);
            },
        }
    }
}

fn should_retry<E: Classify>(error: &E, attempt_index: u32, max_attempts: u32) -> bool {
    attempt_index.saturating_add(1) < max_attempts && error.classify().retryable
}

async fn sleep_with_cancellation(
    ctx: &RequestContext,
    delay: Duration,
    operation: &'static str,
) -> Result<()> {
    tokio::select! {
        () = ctx.cancelled() => Err(ctx.cancellation_error(operation)),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}
