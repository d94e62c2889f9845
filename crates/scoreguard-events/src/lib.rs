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

//! Domain event bus for the scoreguard services.
//!
//! The bus carries typed correlation and decision events with sequential
//! identifiers over `tokio::broadcast`. Subscribers see only events published
//! after they subscribed; a subscriber that lags skips the oldest events and
//! counts them.
//!
//! Layout: `payloads.rs` (event types), `routing.rs` (bus + subscription stream).

pub mod payloads;
pub mod routing;

pub use payloads::{
    DEFAULT_CHANNEL_CAPACITY, Event, EventEnvelope, EventId, ReconciliationOutcome,
};
pub use routing::{EventBus, EventStream};
