//! Notification dispatch.

use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State};
use chrono::Utc;
use scoreguard_events::Event;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::http::constants::{SERVICE_NAME, SUPPORTED_EVENTS, WEBHOOK_PATH};
use crate::http::errors::ApiError;
use crate::http::payload::Notification;
use crate::models::{WebhookAck, WebhookInfoResponse};
use crate::state::WebhookState;

pub(crate) async fn receive_notification(
    State(state): State<Arc<WebhookState>>,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let notification = parse_notification(&body)?;
    let event_type = notification.event_type().to_string();
    state.telemetry.inc_webhook_event(&event_type);
    info!(event_type = %event_type, "webhook received");

    let ack = match event_type.as_str() {
        "Test" => on_test(),
        "Grab" => on_grab(&state, &notification),
        "Download" => on_download(&state, &notification),
        "ManualInteractionRequired" => on_manual_interaction(&state, &notification),
        "HealthIssue" => on_health_issue(&state, &notification),
        _ => {
            debug!(event_type = %event_type, "ignoring unhandled webhook event");
            WebhookAck::ignored(event_type)
        }
    };
    Ok(Json(ack))
}

pub(crate) async fn webhook_info(State(state): State<Arc<WebhookState>>) -> Json<WebhookInfoResponse> {
    Json(WebhookInfoResponse {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        webhook_path: WEBHOOK_PATH,
        supported_events: SUPPORTED_EVENTS,
        authentication_required: state.settings.authentication_required(),
        rate_limit: format!("{} requests/minute", state.settings.max_requests),
        cache_size: state.pending_grabs(),
        supported_methods: &["POST"],
        content_type: "application/json",
    })
}

fn parse_notification(body: &[u8]) -> Result<Notification, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|err| {
        warn!(error = %err, "rejecting malformed webhook body");
        ApiError::bad_request("invalid JSON body")
    })?;
    match &value {
        Value::Object(map) if !map.is_empty() => {}
        _ => return Err(ApiError::bad_request("no JSON data received")),
    }
    serde_json::from_value(value).map_err(|err| {
        warn!(error = %err, "rejecting webhook body with unexpected shape");
        ApiError::bad_request("unexpected notification shape")
    })
}

fn on_test() -> WebhookAck {
    info!("webhook test notification received");
    WebhookAck {
        authenticated: Some(true),
        timestamp: Some(Utc::now().to_rfc3339()),
        ..WebhookAck::new("success", "Webhook test successful! Authentication working.")
    }
}

fn on_grab(state: &WebhookState, notification: &Notification) -> WebhookAck {
    let notice = notification.grab_notice();
    info!(
        series = %notice.series_title,
        score = notice.score,
        indexer = %notice.indexer,
        episodes = notice.episode_ids.len(),
        "grab notification"
    );
    let cached = state.correlator.record_grab(notice);
    state
        .telemetry
        .set_pending_grabs(state.correlator.pending_count());
    WebhookAck {
        episodes_cached: Some(cached),
        ..WebhookAck::new("success", "Grab event cached for monitoring")
    }
}

fn on_download(state: &WebhookState, notification: &Notification) -> WebhookAck {
    let import_score = notification.import_score();
    info!(
        series = %notification.series_title(),
        import_score,
        "download notification"
    );
    for episode_id in notification.episode_ids() {
        let _ = state.correlator.record_import(episode_id, import_score);
    }
    state
        .telemetry
        .set_pending_grabs(state.correlator.pending_count());
    WebhookAck::new("success", "Import processed successfully")
}

fn on_manual_interaction(state: &WebhookState, notification: &Notification) -> WebhookAck {
    let messages = notification.status_messages();
    warn!(
        series = %notification.series_title(),
        download_id = notification.download_id.as_deref().unwrap_or_default(),
        messages = ?messages,
        "manual interaction required"
    );
    if let Some(download_id) = notification.download_id.as_deref() {
        state.correlator.request_download_check(download_id);
    }
    WebhookAck {
        download_id: notification.download_id.clone(),
        ..WebhookAck::new("success", "Manual interaction webhook received")
    }
}

fn on_health_issue(state: &WebhookState, notification: &Notification) -> WebhookAck {
    let level = notification
        .level
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    let message = notification
        .message
        .clone()
        .unwrap_or_else(|| "No message".to_string());
    warn!(level = %level, message = %message, "upstream health issue");
    let _ = state.events.publish(Event::HealthIssue { level, message });
    WebhookAck::new("acknowledged", "Health issue logged")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn parse_rejects_empty_and_non_object_bodies() {
        for body in [&b""[..], b"{}", b"[]", b"null", b"{not json"] {
            let Err(err) = parse_notification(body) else {
                panic!("expected rejection for {body:?}");
            };
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn parse_accepts_unknown_event_types() -> Result<(), Box<dyn std::error::Error>> {
        let notification = parse_notification(br#"{"eventType":"Rename"}"#)
            .map_err(|err| format!("unexpected rejection: {err:?}"))?;
        assert_eq!(notification.event_type(), "Rename");
        Ok(())
    }
}
