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
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Binary entrypoint for the scoreguard queue monitor.

use clap::Parser;
use scoreguard_app::{AppResult, Cli, run_app};

/// Parses arguments and runs the selected mode until it finishes or a shutdown signal arrives.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app(Cli::parse()).await
}
