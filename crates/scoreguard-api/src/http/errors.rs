//! RFC9457-style API error wrapper.

use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use scoreguard_telemetry::RequestContext;

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_INTERNAL, PROBLEM_RATE_LIMITED, PROBLEM_UNAUTHORIZED,
};
use crate::http::rate_limit::insert_rate_limit_headers;
use crate::models::ProblemDetails;

/// Structured API error with optional RFC9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
    rate_limit: Option<ErrorRateLimitContext>,
}

#[derive(Debug)]
struct ErrorRateLimitContext {
    limit: u32,
    remaining: u32,
    retry_after: Option<Duration>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
            rate_limit: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) const fn with_rate_limit_headers(
        mut self,
        limit: u32,
        remaining: u32,
        retry_after: Option<Duration>,
    ) -> Self {
        self.rate_limit = Some(ErrorRateLimitContext {
            limit,
            remaining,
            retry_after,
        });
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            PROBLEM_UNAUTHORIZED,
            "authentication required",
        )
        .with_detail(detail)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn too_many_requests(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            PROBLEM_RATE_LIMITED,
            "rate limit exceeded",
        )
        .with_detail(detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let context = RequestContext::current();
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
            instance: context.as_ref().map(|ctx| ctx.route.clone()),
            request_id: context.map(|ctx| ctx.request_id),
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(rate) = self.rate_limit {
            insert_rate_limit_headers(
                response.headers_mut(),
                rate.limit,
                rate.remaining,
                rate.retry_after,
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::RETRY_AFTER;

    #[test]
    fn rate_limited_error_carries_headers() {
        let response = ApiError::too_many_requests("slow down")
            .with_rate_limit_headers(30, 0, Some(Duration::from_millis(1500)))
            .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers.get("x-ratelimit-limit").map(|v| v.as_bytes()), Some(&b"30"[..]));
        assert_eq!(headers.get("x-ratelimit-remaining").map(|v| v.as_bytes()), Some(&b"0"[..]));
        assert_eq!(headers.get(RETRY_AFTER).map(|v| v.as_bytes()), Some(&b"1"[..]));
    }

    #[tokio::test]
    async fn problem_body_names_the_current_request() -> Result<(), Box<dyn std::error::Error>> {
        let context = RequestContext {
            request_id: "req-7".into(),
            route: "/webhook/sonarr".into(),
        };
        let response = context
            .scope(async { ApiError::bad_request("broken").into_response() })
            .await;
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(body["request_id"], "req-7");
        assert_eq!(body["instance"], "/webhook/sonarr");
        Ok(())
    }

    #[test]
    fn constructors_map_status_and_kind() {
        assert_eq!(ApiError::bad_request("x").status, StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").kind, PROBLEM_UNAUTHORIZED);
        assert_eq!(
            ApiError::internal("x").status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
