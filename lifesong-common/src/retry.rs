//! Bounded retry with exponential backoff
//!
//! Wraps a single idempotent network call. The caller decides which errors
//! are worth another attempt through the `is_retryable` predicate; anything
//! else fails immediately without spending the remaining attempts.
//!
//! **Default policy:**
//! - 3 attempts total
//! - Wait `2^attempt` seconds after a failed attempt (2s, then 4s)
//! - No wait after the final attempt

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * 2^attempt` after the 1-indexed `attempt` failed
    Exponential { base: Duration },
    /// Same delay after every failed attempt
    Fixed(Duration),
}

impl Backoff {
    /// Delay to wait after `attempt` (1-indexed) failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Exponential { base } => {
                let factor = 2u32.saturating_pow(attempt);
                base.saturating_mul(factor)
            }
            Backoff::Fixed(delay) => delay,
        }
    }
}

/// Retry policy: attempt budget plus backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (minimum 1)
    pub max_attempts: u32,
    /// Delay schedule between attempts
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Delay before the attempt following `attempt`, or `None` if `attempt` was the last
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            None
        } else {
            Some(self.backoff.delay_for(attempt))
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            3,
            Backoff::Exponential {
                base: Duration::from_secs(1),
            },
        )
    }
}

/// Terminal outcome of a retried operation
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Error the predicate classified as non-retryable (no further attempts made)
    #[error("{operation} failed on attempt {attempt} with non-retryable error: {error}")]
    Rejected {
        operation: String,
        attempt: u32,
        error: E,
    },

    /// Attempt budget spent on retryable errors
    #[error("{operation} failed after {attempts} attempts. Last error: {last_error}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last_error: E,
    },
}

impl<E> RetryError<E> {
    /// The underlying error of the last attempt
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Rejected { error, .. } => error,
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }
}

/// Run `operation` under `policy`, retrying errors for which `is_retryable` is true.
///
/// `operation` receives the 1-indexed attempt number.
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "whisper transcription")
/// * `policy` - Attempt budget and backoff schedule
/// * `is_retryable` - Classifies an error as transient (retry) or terminal (fail now)
/// * `operation` - Async closure performing one attempt
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    operation_name: &str,
    policy: &RetryPolicy,
    is_retryable: P,
    mut operation: F,
) -> std::result::Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        tracing::debug!(
            operation = operation_name,
            attempt,
            max_attempts = policy.max_attempts,
            "Attempting operation"
        );

        let err = match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !is_retryable(&err) {
            tracing::error!(
                operation = operation_name,
                attempt,
                error = %err,
                "Operation failed with non-retryable error"
            );
            return Err(RetryError::Rejected {
                operation: operation_name.to_string(),
                attempt,
                error: err,
            });
        }

        let Some(delay) = policy.delay_after(attempt) else {
            tracing::error!(
                operation = operation_name,
                attempts = attempt,
                error = %err,
                "Operation failed: retry budget exhausted"
            );
            return Err(RetryError::Exhausted {
                operation: operation_name.to_string(),
                attempts: attempt,
                last_error: err,
            });
        };

        tracing::warn!(
            operation = operation_name,
            attempt,
            error = %err,
            backoff_ms = delay.as_millis() as u64,
            "Operation failed, will retry after backoff"
        );

        tokio::time::sleep(delay).await;
    }
}
