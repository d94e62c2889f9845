//! Per-route request counting with request-context propagation.

use std::sync::Arc;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use scoreguard_telemetry::RequestContext;

use crate::http::constants::HEADER_REQUEST_ID;
use crate::state::WebhookState;

/// Run the route inside a request context and count it by matched path and status.
pub(crate) async fn record_http_request(
    State(state): State<Arc<WebhookState>>,
    request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str)
        .to_string();
    let request_id = request
        .headers()
        .get(HEADER_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let context = RequestContext {
        request_id,
        route: route.clone(),
    };
    let response = context.scope(next.run(request)).await;
    state
        .telemetry
        .inc_http_request(&route, response.status().as_u16());
    response
}
