//! Prometheus-backed metrics registry.
//!
//! # Design
//! - Collector registration is encapsulated; callers only see typed increment helpers.
//! - Domain counters are fed from the event bus through [`Metrics::observe`] so the
//!   core crate stays free of metrics plumbing.
//! - The webhook JSON metrics view is derived from the same counters via [`MetricsSnapshot`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use prometheus::Error as PrometheusError;
use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use scoreguard_events::Event;
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Gate result for an inbound webhook request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookRequestOutcome {
    /// Passed authentication (or authentication is disabled).
    Authenticated,
    /// Failed authentication.
    RejectedAuth,
    /// Rejected by the rate limiter.
    RateLimited,
    /// Served by a route without authentication.
    Public,
}

impl WebhookRequestOutcome {
    /// Label value used in `webhook_requests_total`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::RejectedAuth => "rejected_auth",
            Self::RateLimited => "rate_limited",
            Self::Public => "public",
        }
    }
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    webhook_requests_total: IntCounterVec,
    webhook_events_total: IntCounterVec,
    pending_grabs: IntGauge,
    decisions_total: IntCounterVec,
    actions_executed_total: IntCounterVec,
    monitor_cycles_total: IntCounter,
    reconciliations_total: IntCounterVec,
    webhook_events_processed: AtomicU64,
}

/// Point-in-time view used by the JSON metrics endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Webhook requests seen by the gate, any outcome.
    pub requests_total: u64,
    /// Requests that passed authentication.
    pub requests_authenticated: u64,
    /// Requests rejected by authentication or the rate limiter.
    pub requests_rejected: u64,
    /// Webhook notifications dispatched, any event type.
    pub events_processed: u64,
    /// Grabs awaiting an import.
    pub pending_grabs: i64,
    /// Completed monitor scan cycles.
    pub monitor_cycles_total: u64,
}

impl Metrics {
    /// Construct a registry with every collector registered.
    ///
    /// # Errors
    ///
    /// Returns an error if a collector cannot be built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            &registry,
            "http_requests_total",
            "Total HTTP requests received",
            &["route", "code"],
        )?;
        let events_emitted_total = counter_vec(
            &registry,
            "events_emitted_total",
            "Domain events emitted by type",
            &["type"],
        )?;
        let webhook_requests_total = counter_vec(
            &registry,
            "webhook_requests_total",
            "Webhook requests by gate outcome",
            &["outcome"],
        )?;
        let webhook_events_total = counter_vec(
            &registry,
            "webhook_events_total",
            "Webhook notifications dispatched by event type",
            &["event_type"],
        )?;
        let decisions_total = counter_vec(
            &registry,
            "decisions_total",
            "Decisions reached by action",
            &["action"],
        )?;
        let actions_executed_total = counter_vec(
            &registry,
            "actions_executed_total",
            "Upstream actions executed by action and outcome",
            &["action", "outcome"],
        )?;
        let reconciliations_total = counter_vec(
            &registry,
            "reconciliations_total",
            "Reconciliation checks by outcome",
            &["outcome"],
        )?;
        let pending_grabs = IntGauge::with_opts(Opts::new(
            "pending_grabs",
            "Grabs awaiting an import notification",
        ))
        .map_err(collector_error("pending_grabs", false))?;
        register(&registry, "pending_grabs", pending_grabs.clone())?;
        let monitor_cycles_total = IntCounter::with_opts(Opts::new(
            "monitor_cycles_total",
            "Completed queue scan cycles",
        ))
        .map_err(collector_error("monitor_cycles_total", false))?;
        register(&registry, "monitor_cycles_total", monitor_cycles_total.clone())?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                events_emitted_total,
                webhook_requests_total,
                webhook_events_total,
                pending_grabs,
                decisions_total,
                actions_executed_total,
                monitor_cycles_total,
                reconciliations_total,
                webhook_events_processed: AtomicU64::new(0),
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        let code = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[route, code.as_str()])
            .inc();
    }

    /// Count a webhook request by its gate outcome.
    pub fn inc_webhook_request(&self, outcome: WebhookRequestOutcome) {
        self.inner
            .webhook_requests_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Count a dispatched webhook notification.
    pub fn inc_webhook_event(&self, event_type: &str) {
        self.inner
            .webhook_events_total
            .with_label_values(&[event_type])
            .inc();
        self.inner
            .webhook_events_processed
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Set the pending grab gauge.
    pub fn set_pending_grabs(&self, count: usize) {
        self.inner
            .pending_grabs
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Count one completed scan cycle.
    pub fn inc_monitor_cycle(&self) {
        self.inner.monitor_cycles_total.inc();
    }

    /// Update domain counters from a bus event.
    pub fn observe(&self, event: &Event) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event.kind()])
            .inc();
        match event {
            Event::DecisionReached { action, .. } => {
                self.inner
                    .decisions_total
                    .with_label_values(&[action.as_str()])
                    .inc();
            }
            Event::ActionExecuted {
                action,
                success,
                dry_run,
                ..
            } => {
                let outcome = match (*dry_run, *success) {
                    (true, _) => "dry_run",
                    (false, true) => "success",
                    (false, false) => "failure",
                };
                self.inner
                    .actions_executed_total
                    .with_label_values(&[action.as_str(), outcome])
                    .inc();
            }
            Event::ReconciliationResolved { outcome, .. } => {
                self.inner
                    .reconciliations_total
                    .with_label_values(&[outcome.as_str()])
                    .inc();
            }
            _ => {}
        }
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the output is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buffer)
            .map_err(|source| TelemetryError::Render {
                source: Box::new(source),
            })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::Render {
            source: Box::new(source),
        })
    }

    /// Snapshot of the webhook and monitor counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = |outcome: WebhookRequestOutcome| {
            self.inner
                .webhook_requests_total
                .with_label_values(&[outcome.as_str()])
                .get()
        };
        let authenticated = requests(WebhookRequestOutcome::Authenticated);
        let rejected =
            requests(WebhookRequestOutcome::RejectedAuth) + requests(WebhookRequestOutcome::RateLimited);
        MetricsSnapshot {
            requests_total: authenticated + rejected + requests(WebhookRequestOutcome::Public),
            requests_authenticated: authenticated,
            requests_rejected: rejected,
            events_processed: self.inner.webhook_events_processed.load(Ordering::Relaxed),
            pending_grabs: self.inner.pending_grabs.get(),
            monitor_cycles_total: self.inner.monitor_cycles_total.get(),
        }
    }
}

fn counter_vec(
    registry: &Registry,
    name: &'static str,
    help: &str,
    labels: &[&str],
) -> Result<IntCounterVec> {
    let collector = IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(collector_error(name, false))?;
    register(registry, name, collector.clone())?;
    Ok(collector)
}

fn collector_error(
    name: &'static str,
    registering: bool,
) -> impl FnOnce(PrometheusError) -> TelemetryError {
    move |source| TelemetryError::Collector {
        name,
        registering,
        source,
    }
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<()>
where
    C: Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(collector_error(name, true))
}
