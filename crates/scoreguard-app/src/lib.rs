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

//! Scoreguard application wiring.
//!
//! Layout: `cli.rs` (arguments and run modes), `bootstrap.rs` (config, logging, client),
//! `orchestrator.rs` (service graph and scan loop), `error.rs` (application errors).

/// Boot sequence and run-mode dispatch.
pub mod bootstrap;
/// Command-line surface.
pub mod cli;
/// Application error types.
pub mod error;
/// Service graph and scan loop.
pub mod orchestrator;

pub use bootstrap::run_app;
pub use cli::{Cli, RunMode};
pub use error::{AppError, AppResult};
pub use orchestrator::{Orchestrator, RunOptions};
