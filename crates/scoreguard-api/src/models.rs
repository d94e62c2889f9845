//! Response bodies shared across handlers.

use serde::Serialize;

/// RFC9457 problem document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short summary.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Occurrence-specific detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Route the problem occurred on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Request id of the failed request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Acknowledgement returned by the notification endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    /// `success`, `acknowledged`, or `ignored`.
    pub status: &'static str,
    /// Human readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    /// Set on `Test` notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticated: Option<bool>,
    /// Set on `Test` notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Episodes cached by a `Grab`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episodes_cached: Option<usize>,
    /// Download referenced by a `ManualInteractionRequired`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_id: Option<String>,
    /// Unhandled event type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

impl WebhookAck {
    pub(crate) const fn new(status: &'static str, message: &'static str) -> Self {
        Self {
            status,
            message: Some(message),
            authenticated: None,
            timestamp: None,
            episodes_cached: None,
            download_id: None,
            event_type: None,
        }
    }

    pub(crate) const fn ignored(event_type: String) -> Self {
        Self {
            status: "ignored",
            message: None,
            authenticated: None,
            timestamp: None,
            episodes_cached: None,
            download_id: None,
            event_type: Some(event_type),
        }
    }
}

/// `GET /health` body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// RFC3339 timestamp.
    pub timestamp: String,
    /// Seconds since the server started.
    pub uptime_seconds: u64,
    /// Pending grabs.
    pub cache_size: usize,
}

/// `GET /metrics` body.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookMetricsResponse {
    /// Seconds since the server started.
    pub uptime_seconds: u64,
    /// Gated requests seen.
    pub requests_total: u64,
    /// Requests that passed authentication.
    pub requests_authenticated: u64,
    /// Requests rejected by authentication or rate limiting.
    pub requests_rejected: u64,
    /// Configured request allowance per window.
    pub rate_limit_per_minute: u32,
    /// Notifications dispatched.
    pub events_processed: u64,
    /// Pending grabs.
    pub active_grab_cache_size: usize,
    /// Whether a shared secret is configured.
    pub webhook_secret_configured: bool,
}

/// `GET /webhook/sonarr` body.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookInfoResponse {
    /// Service name.
    pub service: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Notification path.
    pub webhook_path: &'static str,
    /// Dispatched event types.
    pub supported_events: &'static [&'static str],
    /// Whether callers must authenticate.
    pub authentication_required: bool,
    /// `N requests/minute`.
    pub rate_limit: String,
    /// Pending grabs.
    pub cache_size: usize,
    /// Accepted methods for notifications.
    pub supported_methods: &'static [&'static str],
    /// Expected body type.
    pub content_type: &'static str,
}
