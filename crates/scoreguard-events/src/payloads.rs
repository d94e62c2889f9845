//! Event payload types emitted by the correlation pipeline and queue monitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to each event emitted on the bus.
pub type EventId = u64;

/// Events a subscriber may fall behind before it starts skipping.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// How a delayed reconciliation check resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    /// The grab record was already cleared before the check fired.
    AlreadyCleared,
    /// A newer grab replaced the record this check was scheduled for.
    Superseded,
    /// The download was still queued and was handed to the decision engine.
    Processed,
    /// The download was still queued but not yet eligible for a decision.
    StillQueued,
    /// The download left the queue and history shows a completed import.
    ImportedSilently,
    /// The download neither imported nor remains queued.
    Orphaned,
    /// Upstream lookups failed; the record was left in place.
    Failed,
}

impl ReconciliationOutcome {
    /// Stable label for metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyCleared => "already_cleared",
            Self::Superseded => "superseded",
            Self::Processed => "processed",
            Self::StillQueued => "still_queued",
            Self::ImportedSilently => "imported_silently",
            Self::Orphaned => "orphaned",
            Self::Failed => "failed",
        }
    }
}

/// Typed domain events surfaced across the system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A grab notification was cached for an episode.
    GrabCached {
        /// Episode the grab targets.
        episode_id: i64,
        /// Download correlation token, when the notification carried one.
        download_id: Option<String>,
        /// Custom-format score reported at grab time.
        score: i64,
        /// Seconds until the reconciliation check fires.
        check_after_secs: u64,
    },
    /// An import notification cleared a pending grab.
    ImportConfirmed {
        /// Episode that was imported.
        episode_id: i64,
        /// Score of the grab that was pending, if one was cached.
        grab_score: Option<i64>,
        /// Score reported by the import.
        import_score: i64,
    },
    /// An import landed with a score far below what was graded at grab time.
    ScoreMismatch {
        /// Episode that was imported.
        episode_id: i64,
        /// Score at grab time.
        grab_score: i64,
        /// Score reported by the import.
        import_score: i64,
    },
    /// A delayed reconciliation check finished.
    ReconciliationResolved {
        /// Episode the check was scheduled for.
        episode_id: i64,
        /// Download correlation token the check was scheduled for.
        download_id: Option<String>,
        /// Resolution of the check.
        outcome: ReconciliationOutcome,
    },
    /// A download-id check requested by the upstream service finished.
    DownloadChecked {
        /// Download correlation token.
        download_id: String,
        /// Whether the download was found in the queue.
        found: bool,
    },
    /// The decision engine produced an action for a queue item.
    DecisionReached {
        /// Episode analysed, when known.
        episode_id: Option<i64>,
        /// Download correlation token, when known.
        download_id: Option<String>,
        /// Action label (`force_import`, `remove`, `keep`, `wait`, `monitor`).
        action: String,
        /// Human-readable reasoning.
        reasoning: String,
    },
    /// An action was executed (or simulated) against the upstream service.
    ActionExecuted {
        /// Download correlation token, when known.
        download_id: Option<String>,
        /// Action label.
        action: String,
        /// Whether the upstream call succeeded.
        success: bool,
        /// Whether the action was only simulated.
        dry_run: bool,
    },
    /// An episode keeps being grabbed without importing.
    RepeatedGrabsDetected {
        /// Episode with the grab loop.
        episode_id: i64,
        /// Number of grabs seen in recent history.
        grabs: usize,
        /// Number of grabs without a matching import.
        unimported: usize,
    },
    /// The upstream service reported a health issue.
    HealthIssue {
        /// Severity reported upstream.
        level: String,
        /// Issue description.
        message: String,
    },
}

impl Event {
    /// Machine-friendly discriminator for metrics and log filtering.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::GrabCached { .. } => "grab_cached",
            Self::ImportConfirmed { .. } => "import_confirmed",
            Self::ScoreMismatch { .. } => "score_mismatch",
            Self::ReconciliationResolved { .. } => "reconciliation_resolved",
            Self::DownloadChecked { .. } => "download_checked",
            Self::DecisionReached { .. } => "decision_reached",
            Self::ActionExecuted { .. } => "action_executed",
            Self::RepeatedGrabsDetected { .. } => "repeated_grabs_detected",
            Self::HealthIssue { .. } => "health_issue",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier assigned by the bus.
    pub id: EventId,
    /// Emission timestamp.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}
