//! Retry with exponential backoff and a per-attempt timeout.
//!
//! # Design
//! - Attempts run on the calling task; the delay between attempts is an async sleep.
//! - Every attempt is bounded by `attempt_timeout`; a timed-out attempt counts as a
//!   retryable failure.
//! - Errors decide for themselves whether another attempt is worthwhile via [`Retryable`].

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{AttemptError, RetryError, RetryResult};

/// Errors that can tell whether repeating the operation may succeed.
pub trait Retryable {
    /// Whether another attempt may succeed.
    fn is_retryable(&self) -> bool;
}

impl Retryable for anyhow::Error {
    fn is_retryable(&self) -> bool {
        true
    }
}

/// Attempt budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least one is always made).
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failure.
    pub backoff: f64,
    /// Upper bound for a single attempt.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Default multiplier between delays.
    pub const DEFAULT_BACKOFF: f64 = 2.0;
    /// Default per-attempt timeout.
    pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Policy with the default backoff and attempt timeout.
    #[must_use]
    pub const fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            backoff: Self::DEFAULT_BACKOFF,
            attempt_timeout: Self::DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    /// Replace the per-attempt timeout.
    #[must_use]
    pub const fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Replace the backoff multiplier.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: f64) -> Self {
        self.backoff = backoff;
        self
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let factor = if self.backoff.is_finite() && self.backoff >= 1.0 {
            self.backoff
        } else {
            1.0
        };
        Duration::try_from_secs_f64(current.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Run `operation` until it succeeds, fails fatally, or the attempt budget runs out.
///
/// # Errors
///
/// Returns [`RetryError::Fatal`] for a non-retryable error and
/// [`RetryError::Exhausted`] wrapping the final failure otherwise.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut attempt: F,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let failure = match tokio::time::timeout(policy.attempt_timeout, attempt()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) if !err.is_retryable() => {
                debug!(operation, attempts, error = %err, "operation failed without retry");
                return Err(RetryError::Fatal {
                    operation,
                    source: err,
                });
            }
            Ok(Err(err)) => AttemptError::Failed(err),
            Err(_) => AttemptError::TimedOut {
                timeout: policy.attempt_timeout,
            },
        };

        if attempts >= max_attempts {
            warn!(operation, attempts, "retries exhausted");
            return Err(RetryError::Exhausted {
                operation,
                attempts,
                source: failure,
            });
        }

        match &failure {
            AttemptError::Failed(err) => warn!(
                operation,
                attempt = attempts,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "attempt failed; retrying"
            ),
            AttemptError::TimedOut { timeout } => warn!(
                operation,
                attempt = attempts,
                max_attempts,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "attempt timed out; retrying"
            ),
        }
        tokio::time::sleep(delay).await;
        delay = policy.next_delay(delay);
    }
}
