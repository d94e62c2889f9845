//! Rate limiting and shared-secret authentication for the notification routes.
//!
//! # Design
//!
//! - The per-client sliding window runs before authentication so abusive clients are shed cheaply.
//! - `X-Webhook-Secret`, when present, alone decides; otherwise `X-Webhook-Signature`
//!   (`sha256=<hex>` HMAC over the raw body) is checked. Both comparisons are constant time.
//! - Without a configured secret every request is accepted with a warning.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use scoreguard_telemetry::WebhookRequestOutcome;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{error, warn};

use crate::http::constants::{HEADER_WEBHOOK_SECRET, HEADER_WEBHOOK_SIGNATURE, SIGNATURE_PREFIX};
use crate::http::errors::ApiError;
use crate::http::rate_limit::insert_rate_limit_headers;
use crate::state::WebhookState;

type HmacSha256 = Hmac<Sha256>;

const MAX_BODY_BYTES: usize = 1024 * 1024;
const UNKNOWN_CLIENT: &str = "unknown";

/// Rate limit, then authenticate, before the handler runs.
pub(crate) async fn require_webhook_auth(
    State(state): State<Arc<WebhookState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_key(&req);
    let remaining = enforce_rate_limit(&state, &client)?;

    let req = match state.settings.secret.as_deref() {
        None => {
            warn!(client = %client, "no webhook secret configured; accepting unauthenticated request");
            req
        }
        Some(secret) => match authenticate(secret, req).await {
            Ok(req) => req,
            Err(err) => {
                state
                    .telemetry
                    .inc_webhook_request(WebhookRequestOutcome::RejectedAuth);
                warn!(client = %client, "webhook authentication failed");
                return Err(err);
            }
        },
    };

    state
        .telemetry
        .inc_webhook_request(WebhookRequestOutcome::Authenticated);
    let mut response = next.run(req).await;
    insert_rate_limit_headers(
        response.headers_mut(),
        state.settings.max_requests,
        remaining,
        None,
    );
    Ok(response)
}

/// Rate limit only; used by the health probe.
pub(crate) async fn require_rate_limit(
    State(state): State<Arc<WebhookState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_key(&req);
    let remaining = enforce_rate_limit(&state, &client)?;
    state
        .telemetry
        .inc_webhook_request(WebhookRequestOutcome::Public);
    let mut response = next.run(req).await;
    insert_rate_limit_headers(
        response.headers_mut(),
        state.settings.max_requests,
        remaining,
        None,
    );
    Ok(response)
}

fn client_key(req: &Request<Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), |info| info.0.ip().to_string())
}

fn enforce_rate_limit(state: &WebhookState, client: &str) -> Result<u32, ApiError> {
    let status = state.check_rate_limit(client);
    if status.allowed {
        return Ok(status.remaining);
    }
    state
        .telemetry
        .inc_webhook_request(WebhookRequestOutcome::RateLimited);
    warn!(client, limit = state.settings.max_requests, "rate limit exceeded");
    Err(ApiError::too_many_requests(format!(
        "{} requests per {} seconds",
        state.settings.max_requests,
        state.settings.window.as_secs()
    ))
    .with_rate_limit_headers(state.settings.max_requests, 0, status.retry_after))
}

async fn authenticate(secret: &str, req: Request<Body>) -> Result<Request<Body>, ApiError> {
    if let Some(provided) = req.headers().get(HEADER_WEBHOOK_SECRET) {
        return if secrets_match(provided.as_bytes(), secret.as_bytes()) {
            Ok(req)
        } else {
            Err(ApiError::unauthorized("invalid webhook secret"))
        };
    }

    let Some(signature) = req
        .headers()
        .get(HEADER_WEBHOOK_SIGNATURE)
        .map(|value| value.to_str().map(str::to_string))
    else {
        return Err(ApiError::unauthorized(
            "missing webhook secret or signature header",
        ));
    };
    let signature =
        signature.map_err(|_| ApiError::unauthorized("signature header must be valid UTF-8"))?;

    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES).await.map_err(|err| {
        error!(error = %err, "failed to buffer webhook body");
        ApiError::bad_request("request body could not be read")
    })?;
    if !signature_matches(secret, &bytes, &signature) {
        return Err(ApiError::unauthorized("invalid webhook signature"));
    }
    Ok(Request::from_parts(parts, Body::from(bytes)))
}

fn secrets_match(provided: &[u8], expected: &[u8]) -> bool {
    provided.ct_eq(expected).into()
}

/// Verify a `sha256=<hex>` HMAC signature over `body`.
pub(crate) fn signature_matches(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(digest) = header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(digest.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
