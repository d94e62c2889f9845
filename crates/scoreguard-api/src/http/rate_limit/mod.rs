//! Rate-limit response headers.

use std::time::Duration;

use crate::http::constants::{
    HEADER_RATE_LIMIT_LIMIT, HEADER_RATE_LIMIT_REMAINING, HEADER_RATE_LIMIT_RESET,
};
use axum::http::{HeaderMap, HeaderValue, header::RETRY_AFTER};

/// Write `x-ratelimit-*` headers, plus `retry-after` when the caller must back off.
///
/// Sub-second waits round up to one second.
pub(crate) fn insert_rate_limit_headers(
    headers: &mut HeaderMap,
    limit: u32,
    remaining: u32,
    retry_after: Option<Duration>,
) {
    headers.insert(HEADER_RATE_LIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(HEADER_RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
    if let Some(wait) = retry_after {
        let secs = wait.as_secs();
        let seconds = if wait.subsec_nanos() > 0 {
            secs.saturating_add(1)
        } else {
            secs.max(1)
        };
        let value = HeaderValue::from(seconds);
        headers.insert(RETRY_AFTER, value.clone());
        headers.insert(HEADER_RATE_LIMIT_RESET, value);
    }
}
