//! Process span and per-request context.
//!
//! # Design
//! - The process span carries the run mode and build id for every event emitted by the binary.
//! - [`RequestContext`] is task-local: it is visible to anything awaited inside
//!   [`RequestContext::scope`] and absent everywhere else.

use std::future::Future;

use tracing::span::EnteredSpan;

use crate::init::build_sha;

/// Keeps the process-level span entered until dropped.
pub struct GlobalContextGuard {
    _span: EnteredSpan,
}

impl GlobalContextGuard {
    /// Enter the `scoreguard` span tagged with `mode`.
    #[must_use]
    pub fn new(mode: &str) -> Self {
        let span = tracing::info_span!("scoreguard", mode, build_sha = %build_sha());
        Self {
            _span: span.entered(),
        }
    }
}

/// Identity of the HTTP request being served on the current task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Value of the `x-request-id` header.
    pub request_id: String,
    /// Matched route template, or the raw path when no route matched.
    pub route: String,
}

impl RequestContext {
    /// Context of the enclosing [`Self::scope`], if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        REQUEST_CONTEXT.try_with(Clone::clone).ok()
    }

    /// Drive `fut` with `self` as the current context.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        REQUEST_CONTEXT.scope(self, fut).await
    }
}

tokio::task_local! {
    static REQUEST_CONTEXT: RequestContext;
}
