//! Error types for core resilience primitives.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single attempt inside [`crate::retry::retry`].
#[derive(Debug, Error)]
pub enum AttemptError<E> {
    /// The operation returned an error.
    #[error("attempt failed")]
    Failed(#[source] E),
    /// The operation did not finish within the per-attempt timeout.
    #[error("attempt timed out")]
    TimedOut {
        /// Timeout that elapsed.
        timeout: Duration,
    },
}

impl<E> AttemptError<E> {
    /// Underlying operation error, when the attempt did not time out.
    #[must_use]
    pub const fn inner(&self) -> Option<&E> {
        match self {
            Self::Failed(source) => Some(source),
            Self::TimedOut { .. } => None,
        }
    }
}

/// Primary error type for retried operations.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The operation failed with an error that is not worth retrying.
    #[error("operation failed without retry")]
    Fatal {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: E,
    },
    /// Every attempt failed.
    #[error("retries exhausted")]
    Exhausted {
        /// Operation identifier.
        operation: &'static str,
        /// Number of attempts made.
        attempts: u32,
        /// Failure of the final attempt.
        #[source]
        source: AttemptError<E>,
    },
}

impl<E> RetryError<E> {
    /// Operation identifier attached to the failure.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Fatal { operation, .. } | Self::Exhausted { operation, .. } => operation,
        }
    }

    /// Last underlying operation error, if the final attempt produced one.
    #[must_use]
    pub const fn last_error(&self) -> Option<&E> {
        match self {
            Self::Fatal { source, .. } => Some(source),
            Self::Exhausted { source, .. } => source.inner(),
        }
    }
}

/// Convenience alias for retried results.
pub type RetryResult<T, E> = Result<T, RetryError<E>>;
