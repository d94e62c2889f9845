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

//! REST (v3) client for the upstream media-management service.
//!
//! [`SonarrClient`] implements [`scoreguard_core::MediaLibrary`]; every call runs through
//! the core retry wrapper with a per-operation attempt budget.
//!
//! Layout: `client.rs` (requests + trait impl), `policy.rs` (retry budgets), `error.rs`.

pub mod client;
pub mod error;
pub mod policy;

pub use client::{SonarrClient, SonarrSettings};
pub use error::{SonarrError, SonarrResult};
pub use policy::RetryBudgets;
