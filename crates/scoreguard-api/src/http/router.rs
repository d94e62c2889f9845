//! Router construction and server host for the webhook API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, http::Request, middleware, routing::get};
use scoreguard_telemetry::{build_sha, propagate_request_id_layer, set_request_id_layer};
use tokio::net::{TcpListener, lookup_host};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{Span, info, warn};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::auth::{require_rate_limit, require_webhook_auth};
use crate::http::constants::{HEADER_REQUEST_ID, WEBHOOK_PATH};
use crate::http::health::{health, metrics, prometheus};
use crate::http::telemetry::record_http_request;
use crate::http::webhook::{receive_notification, webhook_info};
use crate::state::WebhookState;

/// Axum router wrapper that hosts the notification endpoints.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router around shared webhook state.
    #[must_use]
    pub fn new(state: WebhookState) -> Self {
        let state = Arc::new(state);
        if !state.settings.authentication_required() {
            warn!("webhook secret not configured; notifications are accepted without authentication");
        }
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(propagate_request_id_layer())
            .layer(trace_layer)
            .layer(middleware::from_fn_with_state(
                state.clone(),
                record_http_request,
            ));

        let router = Self::public_routes(&state)
            .merge(Self::gated_routes(&state))
            .route_layer(layered)
            .with_state(state);
        Self { router }
    }

    fn public_routes(state: &Arc<WebhookState>) -> Router<Arc<WebhookState>> {
        let rate_limited = middleware::from_fn_with_state(state.clone(), require_rate_limit);
        Router::new().route("/health", get(health).route_layer(rate_limited))
    }

    fn gated_routes(state: &Arc<WebhookState>) -> Router<Arc<WebhookState>> {
        let require_auth = middleware::from_fn_with_state(state.clone(), require_webhook_auth);
        Router::new()
            .route(
                WEBHOOK_PATH,
                get(webhook_info)
                    .post(receive_notification)
                    .route_layer(require_auth.clone()),
            )
            .route("/metrics", get(metrics).route_layer(require_auth.clone()))
            .route(
                "/metrics/prometheus",
                get(prometheus).route_layer(require_auth),
            )
    }

    /// Resolve `host:port`, then serve until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not resolve, the listener fails to bind, or the
    /// server terminates unexpectedly.
    pub async fn serve(
        self,
        host: &str,
        port: u16,
        shutdown: CancellationToken,
    ) -> ApiServerResult<()> {
        let addr = lookup_host((host, port))
            .await
            .map_err(|source| ApiServerError::Resolve {
                endpoint: format!("{host}:{port}"),
                source,
            })?
            .next()
            .ok_or_else(|| ApiServerError::unresolved(host, port))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        info!(%addr, path = WEBHOOK_PATH, "webhook server listening");
        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled_owned().await })
        .await
        .map_err(|source| ApiServerError::Serve { addr, source })?;
        info!(%addr, "webhook server stopped");
        Ok(())
    }

    /// Underlying router, for in-process requests.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }
}
