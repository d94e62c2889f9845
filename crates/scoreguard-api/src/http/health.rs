//! Health and metrics endpoints.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::Response,
};
use chrono::Utc;
use tracing::error;

use crate::http::constants::SERVICE_NAME;
use crate::http::errors::ApiError;
use crate::models::{HealthResponse, WebhookMetricsResponse};
use crate::state::WebhookState;

pub(crate) async fn health(State(state): State<Arc<WebhookState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
        uptime_seconds: state.uptime_seconds(),
        cache_size: state.pending_grabs(),
    })
}

pub(crate) async fn metrics(State(state): State<Arc<WebhookState>>) -> Json<WebhookMetricsResponse> {
    let active_grab_cache_size = state.pending_grabs();
    let snapshot = state.telemetry.snapshot();
    Json(WebhookMetricsResponse {
        uptime_seconds: state.uptime_seconds(),
        requests_total: snapshot.requests_total,
        requests_authenticated: snapshot.requests_authenticated,
        requests_rejected: snapshot.requests_rejected,
        rate_limit_per_minute: state.settings.max_requests,
        events_processed: snapshot.events_processed,
        active_grab_cache_size,
        webhook_secret_configured: state.settings.authentication_required(),
    })
}

pub(crate) async fn prometheus(State(state): State<Arc<WebhookState>>) -> Result<Response, ApiError> {
    let _ = state.pending_grabs();
    let body = state.telemetry.render().map_err(|err| {
        error!(error = %err, "failed to render metrics");
        ApiError::internal("failed to render metrics")
    })?;
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .map_err(|err| {
            error!(error = %err, "failed to build metrics response");
            ApiError::internal("failed to build metrics response")
        })
}
