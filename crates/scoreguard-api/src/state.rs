//! Shared state handed to every route.

use std::sync::Arc;
use std::time::{Duration, Instant};

use scoreguard_core::{Correlator, RateLimitStatus, SlidingWindowLimiter};
use scoreguard_events::EventBus;
use scoreguard_telemetry::Metrics;

/// Gate parameters for the notification endpoints.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    /// Shared secret; `None` disables authentication.
    pub secret: Option<String>,
    /// Requests allowed per client per window.
    pub max_requests: u32,
    /// Sliding window length.
    pub window: Duration,
}

impl WebhookSettings {
    /// Whether callers must authenticate.
    #[must_use]
    pub const fn authentication_required(&self) -> bool {
        self.secret.is_some()
    }
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            secret: None,
            max_requests: 30,
            window: Duration::from_secs(60),
        }
    }
}

/// Dependencies shared by the gate and the handlers.
pub struct WebhookState {
    pub(crate) correlator: Arc<Correlator>,
    pub(crate) events: EventBus,
    pub(crate) telemetry: Metrics,
    pub(crate) settings: WebhookSettings,
    limiter: SlidingWindowLimiter,
    started_at: Instant,
}

impl WebhookState {
    /// Bundle the correlator, bus, and metrics with the gate settings.
    #[must_use]
    pub fn new(
        correlator: Arc<Correlator>,
        events: EventBus,
        telemetry: Metrics,
        settings: WebhookSettings,
    ) -> Self {
        let secret = settings.secret.clone().filter(|secret| !secret.is_empty());
        Self {
            correlator,
            events,
            telemetry,
            settings: WebhookSettings { secret, ..settings },
            limiter: SlidingWindowLimiter::new(),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn check_rate_limit(&self, client: &str) -> RateLimitStatus {
        self.limiter
            .check(client, self.settings.max_requests, self.settings.window)
    }

    pub(crate) fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub(crate) fn pending_grabs(&self) -> usize {
        let pending = self.correlator.pending_count();
        self.telemetry.set_pending_grabs(pending);
        pending
    }
}
