//! Per-key sliding-window rate limiter.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Result of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Whether the request was admitted (and recorded).
    pub allowed: bool,
    /// Requests still available in the current window.
    pub remaining: u32,
    /// Time until the oldest recorded request leaves the window, when rejected.
    pub retry_after: Option<Duration>,
}

/// Sliding-window limiter keyed by client identifier.
///
/// Keys whose window has fully elapsed are swept at most once per window during `check`.
#[derive(Debug, Default)]
pub struct SlidingWindowLimiter {
    state: Mutex<Windows>,
}

#[derive(Debug, Default)]
struct Windows {
    keys: HashMap<String, VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

impl Windows {
    fn sweep(&mut self, now: Instant, window: Duration) {
        self.keys.retain(|_, stamps| {
            stamps
                .back()
                .is_some_and(|latest| now.duration_since(*latest) < window)
        });
        self.last_sweep = Some(now);
    }
}

impl SlidingWindowLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prune, check and record atomically for `key`.
    #[must_use]
    pub fn check(&self, key: &str, max_requests: u32, window: Duration) -> RateLimitStatus {
        let now = Instant::now();
        let limit = usize::try_from(max_requests).unwrap_or(usize::MAX);
        let mut windows = self.lock();
        let sweep_due = windows
            .last_sweep
            .is_none_or(|swept| now.duration_since(swept) >= window);
        if sweep_due {
            windows.sweep(now, window);
        }
        let stamps = windows.keys.entry(key.to_string()).or_default();
        while stamps
            .front()
            .is_some_and(|stamp| now.duration_since(*stamp) >= window)
        {
            stamps.pop_front();
        }

        if stamps.len() >= limit {
            let retry_after = stamps
                .front()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)));
            return RateLimitStatus {
                allowed: false,
                remaining: 0,
                retry_after,
            };
        }

        stamps.push_back(now);
        let remaining = u32::try_from(limit - stamps.len()).unwrap_or(u32::MAX);
        RateLimitStatus {
            allowed: true,
            remaining,
            retry_after: None,
        }
    }

    /// Whether a request from `key` is admitted.
    #[must_use]
    pub fn is_allowed(&self, key: &str, max_requests: u32, window: Duration) -> bool {
        self.check(key, max_requests, window).allowed
    }

    /// Drop keys whose windows are empty after pruning.
    pub fn prune_idle(&self, window: Duration) {
        self.lock().sweep(Instant::now(), window);
    }

    /// Number of tracked client keys.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.lock().keys.len()
    }

    fn lock(&self) -> MutexGuard<'_, Windows> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
