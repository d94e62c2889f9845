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

//! Core domain logic for scoreguard.
//!
//! The crate compares custom-format scores of grabbed releases against the files
//! that were actually imported, decides what to do about mismatches, and correlates
//! grab/import notifications with delayed reconciliation against upstream state.
//! Upstream access sits behind the [`MediaLibrary`] trait so adapters and fakes are
//! interchangeable.
//!
//! Layout: `model.rs` (records and wire models), `decision.rs` (decision engine),
//! `tracker.rs` (indexer classification), `cache.rs`/`retry.rs`/`rate_limit.rs`
//! (resilience primitives), `library.rs`/`cached.rs` (upstream seam + caching
//! decorator), `analyzer.rs`, `monitor.rs` (queue scanning), `correlation/`
//! (grab table, reconciliation scheduler, correlator).

pub mod analyzer;
pub mod cache;
pub mod cached;
pub mod correlation;
pub mod decision;
pub mod error;
pub mod library;
pub mod model;
pub mod monitor;
pub mod rate_limit;
pub mod retry;
pub mod tracker;

pub use analyzer::{ScoreAnalyzer, ScoreSnapshot};
pub use cache::{CacheStats, TtlCache};
pub use cached::{CacheSettings, CachedLibrary};
pub use correlation::{
    CorrelationSettings, Correlator, GrabNotice, GrabTable, ReconciliationScheduler,
    ScheduledCheck,
};
pub use decision::{Decision, DecisionAction, DecisionEngine, decide, detect_repeated_grabs};
pub use error::{AttemptError, RetryError, RetryResult};
pub use library::{MediaLibrary, QueueProcessor, RemoveOptions};
pub use model::{
    CustomFormat, CustomFormatRef, Episode, EpisodeFile, FormatItem, GrabRecord, HistoryData,
    HistoryEventType, HistoryRecord, QualityProfile, QueueItem, Series, StatusMessage,
    SystemStatus,
};
pub use monitor::{
    ConnectionReport, EpisodeReport, HistorySummary, MonitorSettings, MonitorStatsSnapshot,
    ProcessOutcome, QueueMonitor, ScanSummary, is_stuck,
};
pub use rate_limit::{RateLimitStatus, SlidingWindowLimiter};
pub use retry::{RetryPolicy, Retryable, retry};
pub use tracker::{TrackerClassifier, TrackerKind};
