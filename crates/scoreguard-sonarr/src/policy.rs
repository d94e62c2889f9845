//! Attempt budgets for each upstream operation.

use std::time::Duration;

use scoreguard_core::RetryPolicy;

/// Retry policies per upstream operation; every attempt is bounded by the client timeout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryBudgets {
    /// `system_status`.
    pub status: RetryPolicy,
    /// Custom formats, quality profiles and the series map.
    pub definitions: RetryPolicy,
    /// Queue, series, episode, history and file lookups.
    pub lookups: RetryPolicy,
    /// Manual imports.
    pub import: RetryPolicy,
    /// Queue removals.
    pub removal: RetryPolicy,
}

impl RetryBudgets {
    /// Standard budgets with `attempt_timeout` applied to each attempt.
    #[must_use]
    pub const fn standard(attempt_timeout: Duration) -> Self {
        Self {
            status: RetryPolicy::new(3, Duration::from_secs(1))
                .with_attempt_timeout(attempt_timeout),
            definitions: RetryPolicy::new(2, Duration::from_secs(2))
                .with_attempt_timeout(attempt_timeout),
            lookups: RetryPolicy::new(2, Duration::from_secs(1))
                .with_attempt_timeout(attempt_timeout),
            import: RetryPolicy::new(2, Duration::from_secs(2))
                .with_attempt_timeout(attempt_timeout),
            removal: RetryPolicy::new(2, Duration::from_secs(1))
                .with_attempt_timeout(attempt_timeout),
        }
    }

    /// Single attempt with no delay, for tests and one-shot probes.
    #[must_use]
    pub const fn single(attempt_timeout: Duration) -> Self {
        let once = RetryPolicy::new(1, Duration::ZERO).with_attempt_timeout(attempt_timeout);
        Self {
            status: once,
            definitions: once,
            lookups: once,
            import: once,
            removal: once,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_budgets_share_the_attempt_timeout() {
        let budgets = RetryBudgets::standard(Duration::from_secs(30));
        assert_eq!(budgets.status.max_attempts, 3);
        assert_eq!(budgets.definitions.initial_delay, Duration::from_secs(2));
        assert_eq!(budgets.lookups.max_attempts, 2);
        assert_eq!(budgets.import.attempt_timeout, Duration::from_secs(30));
        assert!((budgets.removal.backoff - 2.0).abs() < f64::EPSILON);
    }
}
