#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Inbound notification server for scoreguard.
//!
//! Grab, import, manual-interaction, and health notifications from the media
//! manager pass a per-client rate limit and a shared-secret gate before they reach
//! the correlation pipeline.
//!
//! Layout: `state.rs` (shared dependencies + gate settings), `models.rs` (response
//! bodies), `error.rs` (server errors), `http/` (router, gate middleware, handlers).

pub mod error;
pub mod http;
pub mod models;
pub mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
pub use models::{
    HealthResponse, ProblemDetails, WebhookAck, WebhookInfoResponse, WebhookMetricsResponse,
};
pub use state::{WebhookSettings, WebhookState};
