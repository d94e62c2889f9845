//! Queue scanning and action execution.
//!
//! # Design
//! - Every queue item passes through [`ScoreAnalyzer`] before any mutation.
//! - Dry-run mode logs intended mutations and reports them as successful.
//! - A forced import is followed by a settle delay and removal of any lingering queue entry
//!   for the same download, leaving the download client untouched.
//! - Counters are atomics so the monitor can be shared across tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use scoreguard_events::{Event, EventBus};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::analyzer::{HISTORY_LIMIT, ScoreAnalyzer, ScoreSnapshot};
use crate::decision::{Decision, DecisionAction, detect_repeated_grabs};
use crate::library::{MediaLibrary, QueueProcessor, RemoveOptions};
use crate::model::{Episode, HistoryEventType, HistoryRecord, QueueItem, Series, format_names};

/// History entries scanned by [`QueueMonitor::check_repeated_grabs`].
pub const REPEATED_GRAB_SCAN_LIMIT: usize = 200;
/// History entries summarised by [`QueueMonitor::inspect_episode`].
pub const INSPECT_HISTORY_LIMIT: usize = 10;
/// Default wait between a forced import and the queue cleanup.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(8);

const STUCK_MESSAGE_KEYWORDS: [&str; 4] = ["already", "exists", "duplicate", "matched to series by id"];

/// Whether a queue item shows a known non-progressing pattern.
#[must_use]
pub fn is_stuck(item: &QueueItem) -> bool {
    let state = item.tracked_download_state.as_deref();
    if matches!(state, Some("importPending" | "importBlocked")) {
        return true;
    }
    if item.status.as_deref() == Some("completed")
        && item.tracked_download_status.as_deref() == Some("warning")
    {
        return true;
    }
    item.status_messages
        .iter()
        .flat_map(|message| message.messages.iter())
        .map(|line| line.to_lowercase())
        .any(|line| STUCK_MESSAGE_KEYWORDS.iter().any(|keyword| line.contains(keyword)))
}

/// Result of processing one queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Manual import executed.
    ForcedImport,
    /// Removed from queue and client.
    Removed,
    /// Removed from queue, kept in client.
    Kept,
    /// Within tolerance; nothing done.
    Waiting,
    /// Scores unknown; nothing done.
    Monitored,
    /// The action could not be executed.
    Failed,
}

impl ProcessOutcome {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ForcedImport => "forced_import",
            Self::Removed => "removed",
            Self::Kept => "kept",
            Self::Waiting => "waiting",
            Self::Monitored => "monitored",
            Self::Failed => "failed",
        }
    }
}

/// Counts for one stuck-import scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Stuck items processed.
    pub processed: usize,
    /// Items force-imported.
    pub forced: usize,
    /// Items removed from queue and client.
    pub removed: usize,
}

/// Point-in-time copy of the monitor counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStatsSnapshot {
    /// Completed scan cycles.
    pub cycles: u64,
    /// Queue items processed.
    pub items_processed: u64,
    /// Successful forced imports.
    pub forced_imports: u64,
    /// Successful removals.
    pub removals: u64,
    /// Failures encountered.
    pub errors: u64,
}

#[derive(Debug, Default)]
struct MonitorStats {
    cycles: AtomicU64,
    items_processed: AtomicU64,
    forced_imports: AtomicU64,
    removals: AtomicU64,
    errors: AtomicU64,
}

impl MonitorStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MonitorStatsSnapshot {
        MonitorStatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            items_processed: self.items_processed.load(Ordering::Relaxed),
            forced_imports: self.forced_imports.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Runtime switches for [`QueueMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Log intended mutations instead of executing them.
    pub dry_run: bool,
    /// Wait between a forced import and the queue cleanup.
    pub settle_delay: Duration,
    /// Webhook receiver enabled without a shared secret.
    pub webhook_without_secret: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            dry_run: false,
            settle_delay: DEFAULT_SETTLE_DELAY,
            webhook_without_secret: false,
        }
    }
}

/// Summary of an episode's recent history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistorySummary {
    /// Up to three most recent grabs.
    pub recent_grabs: Vec<HistoryRecord>,
    /// Up to three most recent imported or ignored downloads.
    pub recent_imports: Vec<HistoryRecord>,
    /// Most recent grab score minus most recent import score.
    pub latest_difference: Option<i64>,
    /// Whether `|latest_difference|` reaches the threshold.
    pub significant_mismatch: bool,
}

/// Diagnostic report for one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeReport {
    /// Resolved series.
    pub series: Series,
    /// Resolved episode.
    pub episode: Episode,
    /// Currently imported file.
    pub current_score: Option<i64>,
    /// Formats of the currently imported file.
    pub current_formats: Vec<String>,
    /// Decision for the episode's queue item, when queued.
    pub queue_decision: Option<Decision>,
    /// History summary, when not queued.
    pub history: Option<HistorySummary>,
}

/// Outcome of a connectivity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    /// Upstream version string.
    pub version: Option<String>,
    /// Custom formats defined upstream.
    pub custom_formats: usize,
    /// Quality profiles defined upstream.
    pub quality_profiles: usize,
    /// Series with a quality profile mapping.
    pub series_mapped: usize,
}

/// Scans the queue and executes decisions.
pub struct QueueMonitor {
    library: Arc<dyn MediaLibrary>,
    analyzer: ScoreAnalyzer,
    events: EventBus,
    settings: MonitorSettings,
    stats: MonitorStats,
}

impl QueueMonitor {
    /// Build a monitor. `library` is normally the cached view.
    #[must_use]
    pub fn new(
        library: Arc<dyn MediaLibrary>,
        analyzer: ScoreAnalyzer,
        events: EventBus,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            library,
            analyzer,
            events,
            settings,
            stats: MonitorStats::default(),
        }
    }

    /// Whether mutations are suppressed.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.settings.dry_run
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> MonitorStatsSnapshot {
        self.stats.snapshot()
    }

    /// Emit the counters at info level.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            cycles = stats.cycles,
            items_processed = stats.items_processed,
            forced_imports = stats.forced_imports,
            removals = stats.removals,
            errors = stats.errors,
            "monitor statistics"
        );
    }

    /// Scan the queue once and process every stuck item.
    ///
    /// # Errors
    ///
    /// Returns an error when the queue cannot be fetched.
    pub async fn process_stuck_imports(&self) -> anyhow::Result<ScanSummary> {
        MonitorStats::bump(&self.stats.cycles);
        let queue = self.library.queue().await.inspect_err(|_| {
            MonitorStats::bump(&self.stats.errors);
        })?;
        let stuck: Vec<&QueueItem> = queue.iter().filter(|item| is_stuck(item)).collect();
        if stuck.is_empty() {
            debug!(queue_len = queue.len(), "no stuck imports");
            return Ok(ScanSummary::default());
        }
        info!(stuck = stuck.len(), "processing stuck imports");

        let mut summary = ScanSummary::default();
        for item in stuck {
            let outcome = self.process_item(item).await;
            summary.processed += 1;
            match outcome {
                ProcessOutcome::ForcedImport => summary.forced += 1,
                ProcessOutcome::Removed => summary.removed += 1,
                _ => {}
            }
        }
        Ok(summary)
    }

    /// Analyse one item and execute its action. Failures are logged and reported as
    /// [`ProcessOutcome::Failed`].
    pub async fn process_item(&self, item: &QueueItem) -> ProcessOutcome {
        MonitorStats::bump(&self.stats.items_processed);
        let download_id = item.download_id.as_deref().unwrap_or_default();
        info!(
            download_id,
            series = item.series_title(),
            episode = %item.episode_label(),
            title = item.title.as_deref().unwrap_or_default(),
            "processing queue item"
        );

        let decision = match self.analyzer.analyze(item).await {
            Ok(decision) => decision,
            Err(err) => {
                error!(download_id, error = %err, "analysis failed");
                MonitorStats::bump(&self.stats.errors);
                return ProcessOutcome::Failed;
            }
        };
        let _ = self.events.publish(Event::DecisionReached {
            episode_id: item.episode_id(),
            download_id: item.download_id.clone(),
            action: decision.action.as_str().to_string(),
            reasoning: decision.reasoning.clone(),
        });

        let outcome = match decision.action {
            DecisionAction::ForceImport => self.execute_force_import(item).await,
            DecisionAction::Remove => {
                self.execute_removal(item, DecisionAction::Remove, RemoveOptions::from_client())
                    .await
            }
            DecisionAction::Keep => {
                self.execute_removal(item, DecisionAction::Keep, RemoveOptions::queue_only())
                    .await
            }
            DecisionAction::Wait => {
                info!(download_id, reasoning = %decision.reasoning, "waiting");
                ProcessOutcome::Waiting
            }
            DecisionAction::Monitor => {
                info!(download_id, reasoning = %decision.reasoning, "monitoring");
                ProcessOutcome::Monitored
            }
        };

        match outcome {
            ProcessOutcome::ForcedImport => MonitorStats::bump(&self.stats.forced_imports),
            ProcessOutcome::Removed => MonitorStats::bump(&self.stats.removals),
            ProcessOutcome::Failed => MonitorStats::bump(&self.stats.errors),
            _ => {}
        }
        outcome
    }

    async fn execute_force_import(&self, item: &QueueItem) -> ProcessOutcome {
        let (Some(download_id), Some(episode_id)) = (item.download_id.as_deref(), item.episode_id())
        else {
            error!("force import needs a download id and an episode id");
            return ProcessOutcome::Failed;
        };
        if self.settings.dry_run {
            info!(download_id, episode_id, "dry run: would force import");
            self.record_action(item, DecisionAction::ForceImport, true);
            return ProcessOutcome::ForcedImport;
        }

        match self
            .library
            .force_import(download_id, episode_id, item.quality.clone())
            .await
        {
            Ok(true) => {
                info!(download_id, episode_id, "forced import");
                self.record_action(item, DecisionAction::ForceImport, true);
                tokio::time::sleep(self.settings.settle_delay).await;
                self.cleanup_after_import(download_id).await;
                ProcessOutcome::ForcedImport
            }
            Ok(false) => {
                warn!(download_id, "no importable files for download");
                self.record_action(item, DecisionAction::ForceImport, false);
                ProcessOutcome::Failed
            }
            Err(err) => {
                error!(download_id, error = %err, "force import failed");
                self.record_action(item, DecisionAction::ForceImport, false);
                ProcessOutcome::Failed
            }
        }
    }

    async fn cleanup_after_import(&self, download_id: &str) {
        let queue = match self.library.queue().await {
            Ok(queue) => queue,
            Err(err) => {
                warn!(download_id, error = %err, "post-import queue lookup failed");
                return;
            }
        };
        let lingering = queue
            .iter()
            .find(|entry| entry.download_id.as_deref() == Some(download_id))
            .and_then(|entry| entry.id);
        let Some(queue_id) = lingering else {
            debug!(download_id, "no queue cleanup needed");
            return;
        };
        match self
            .library
            .remove_from_queue(queue_id, RemoveOptions::queue_only())
            .await
        {
            Ok(()) => info!(download_id, queue_id, "removed lingering queue entry after import"),
            Err(err) => warn!(download_id, queue_id, error = %err, "post-import cleanup failed"),
        }
    }

    async fn execute_removal(
        &self,
        item: &QueueItem,
        action: DecisionAction,
        options: RemoveOptions,
    ) -> ProcessOutcome {
        let success_outcome = if options.remove_from_client {
            ProcessOutcome::Removed
        } else {
            ProcessOutcome::Kept
        };
        let Some(queue_id) = item.id else {
            error!(action = action.as_str(), "queue id missing");
            return ProcessOutcome::Failed;
        };
        if self.settings.dry_run {
            info!(
                queue_id,
                remove_from_client = options.remove_from_client,
                "dry run: would remove from queue"
            );
            self.record_action(item, action, true);
            return success_outcome;
        }

        match self.library.remove_from_queue(queue_id, options).await {
            Ok(()) => {
                info!(
                    queue_id,
                    remove_from_client = options.remove_from_client,
                    "removed from queue"
                );
                self.record_action(item, action, true);
                success_outcome
            }
            Err(err) => {
                error!(queue_id, error = %err, "queue removal failed");
                self.record_action(item, action, false);
                ProcessOutcome::Failed
            }
        }
    }

    fn record_action(&self, item: &QueueItem, action: DecisionAction, success: bool) {
        let _ = self.events.publish(Event::ActionExecuted {
            download_id: item.download_id.clone(),
            action: action.as_str().to_string(),
            success,
            dry_run: self.settings.dry_run,
        });
    }

    /// Look for episodes stuck in a grab loop. Returns the number of problem episodes.
    ///
    /// # Errors
    ///
    /// Returns an error when the recent history cannot be fetched.
    pub async fn check_repeated_grabs(&self) -> anyhow::Result<usize> {
        let records = self.library.recent_history(REPEATED_GRAB_SCAN_LIMIT).await?;
        let mut grabs_by_episode: HashMap<i64, usize> = HashMap::new();
        let mut order = Vec::new();
        for record in &records {
            if record.event_type != HistoryEventType::Grabbed {
                continue;
            }
            if let Some(episode_id) = record.episode_id() {
                let count = grabs_by_episode.entry(episode_id).or_insert_with(|| {
                    order.push(episode_id);
                    0
                });
                *count += 1;
            }
        }

        let mut problems = 0;
        for episode_id in order {
            let grabs = grabs_by_episode.get(&episode_id).copied().unwrap_or_default();
            if grabs < 2 {
                continue;
            }
            let history = match self.library.history_for_episode(episode_id, HISTORY_LIMIT).await {
                Ok(history) => history,
                Err(err) => {
                    warn!(episode_id, error = %err, "failed to load episode history");
                    continue;
                }
            };
            let unimported = detect_repeated_grabs(&history);
            if unimported.is_empty() {
                continue;
            }
            problems += 1;
            warn!(episode_id, grabs, unimported = unimported.len(), "repeated grabs without import");
            let _ = self.events.publish(Event::RepeatedGrabsDetected {
                episode_id,
                grabs,
                unimported: unimported.len(),
            });
            if let Err(err) = self.check_episode_queue(episode_id).await {
                warn!(episode_id, error = %err, "episode queue check failed");
            }
        }

        if problems == 0 {
            debug!("no repeated grab issues");
        } else {
            warn!(problems, "episodes with repeated grab issues");
        }
        Ok(problems)
    }

    /// Process the queue item for an episode. Returns whether one was found.
    ///
    /// # Errors
    ///
    /// Returns an error when the queue cannot be fetched.
    pub async fn check_episode_queue(&self, episode_id: i64) -> anyhow::Result<bool> {
        let queue = self.library.queue().await?;
        let Some(item) = queue.iter().find(|item| item.episode_id() == Some(episode_id)) else {
            debug!(episode_id, "episode not in queue");
            return Ok(false);
        };
        info!(episode_id, "episode found in queue");
        let _ = self.process_item(item).await;
        Ok(true)
    }

    /// Resolve an episode by title and number and report its score state.
    ///
    /// # Errors
    ///
    /// Returns an error when the series or episode cannot be found or upstream fails.
    pub async fn inspect_episode(
        &self,
        series_title: &str,
        season: i64,
        episode_number: i64,
    ) -> anyhow::Result<EpisodeReport> {
        let series = self
            .library
            .series_by_title(series_title)
            .await?
            .ok_or_else(|| anyhow::anyhow!("series '{series_title}' not found"))?;
        let episode = self
            .library
            .episode_by_number(series.id, season, episode_number)
            .await?
            .ok_or_else(|| anyhow::anyhow!("episode S{season:02}E{episode_number:02} not found"))?;
        info!(series = %series.title, series_id = series.id, episode_id = episode.id, has_file = episode.has_file, "inspecting episode");

        let ScoreSnapshot {
            score: current_score,
            formats: current_formats,
        } = self
            .analyzer
            .current_file_score(episode.id, Some(series.id))
            .await;

        let queue = self.library.queue().await?;
        let queued = queue.iter().find(|item| item.episode_id() == Some(episode.id));
        let (queue_decision, history) = if let Some(item) = queued {
            let decision = self.analyzer.analyze(item).await?;
            info!(action = %decision.action, reasoning = %decision.reasoning, dry_run = self.settings.dry_run, "queued episode decision");
            (Some(decision), None)
        } else {
            let records = self
                .library
                .history_for_episode(episode.id, INSPECT_HISTORY_LIMIT)
                .await?;
            let summary = summarize_history(&records, self.analyzer.engine().threshold());
            (None, Some(summary))
        };

        Ok(EpisodeReport {
            series,
            episode,
            current_score,
            current_formats,
            queue_decision,
            history,
        })
    }

    /// Probe connectivity and upstream configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when any upstream lookup fails.
    pub async fn test_connection(&self) -> anyhow::Result<ConnectionReport> {
        let status = self.library.system_status().await?;
        let custom_formats = self.library.custom_formats().await?.len();
        let quality_profiles = self.library.quality_profiles().await?.len();
        let series_mapped = self.library.series_profile_map().await?.len();
        info!(
            version = status.version.as_deref().unwrap_or("unknown"),
            custom_formats,
            quality_profiles,
            series_mapped,
            "upstream connection verified"
        );
        if self.settings.webhook_without_secret {
            warn!("webhook enabled but no secret configured");
        }
        Ok(ConnectionReport {
            version: status.version,
            custom_formats,
            quality_profiles,
            series_mapped,
        })
    }
}

/// Summarise recent grabs and imports of one episode.
#[must_use]
pub fn summarize_history(records: &[HistoryRecord], threshold: i64) -> HistorySummary {
    let grabs: Vec<&HistoryRecord> = records
        .iter()
        .filter(|record| record.event_type == HistoryEventType::Grabbed)
        .collect();
    let imports: Vec<&HistoryRecord> = records
        .iter()
        .filter(|record| {
            matches!(
                record.event_type,
                HistoryEventType::DownloadFolderImported | HistoryEventType::DownloadIgnored
            )
        })
        .collect();

    for grab in grabs.iter().take(3) {
        info!(
            score = grab.custom_format_score.unwrap_or_default(),
            indexer = grab.indexer(),
            title = grab.source_title.as_deref().unwrap_or("N/A"),
            formats = %format_names(&grab.custom_formats).join(", "),
            "recent grab"
        );
    }

    let latest_difference = grabs.first().zip(imports.first()).map(|(grab, import)| {
        grab.custom_format_score
            .unwrap_or_default()
            .saturating_sub(import.custom_format_score.unwrap_or_default())
    });
    let significant_mismatch = latest_difference.is_some_and(|diff| diff.abs() >= threshold);

    HistorySummary {
        recent_grabs: grabs.into_iter().take(3).cloned().collect(),
        recent_imports: imports.into_iter().take(3).cloned().collect(),
        latest_difference,
        significant_mismatch,
    }
}

#[async_trait]
impl QueueProcessor for QueueMonitor {
    async fn process_queue_item(&self, item: &QueueItem) -> anyhow::Result<bool> {
        Ok(self.process_item(item).await != ProcessOutcome::Failed)
    }

    async fn check_download_queue(&self, download_id: &str) -> anyhow::Result<bool> {
        let queue = self.library.queue().await?;
        let Some(item) = queue
            .iter()
            .find(|item| item.download_id.as_deref() == Some(download_id))
        else {
            debug!(download_id, "download not in queue");
            let _ = self.events.publish(Event::DownloadChecked {
                download_id: download_id.to_string(),
                found: false,
            });
            return Ok(false);
        };
        info!(download_id, "download found in queue");
        let _ = self.events.publish(Event::DownloadChecked {
            download_id: download_id.to_string(),
            found: true,
        });
        let _ = self.process_item(item).await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatusMessage;

    fn item() -> QueueItem {
        QueueItem::default()
    }

    #[test]
    fn stuck_states_and_messages_are_detected() {
        let pending = QueueItem {
            tracked_download_state: Some("importPending".into()),
            ..item()
        };
        let blocked = QueueItem {
            tracked_download_state: Some("importBlocked".into()),
            ..item()
        };
        let warning = QueueItem {
            status: Some("completed".into()),
            tracked_download_status: Some("warning".into()),
            ..item()
        };
        let duplicate = QueueItem {
            status_messages: vec![StatusMessage {
                title: None,
                messages: vec!["Episode file ALREADY imported".into()],
            }],
            ..item()
        };
        let downloading = QueueItem {
            status: Some("downloading".into()),
            tracked_download_state: Some("downloading".into()),
            ..item()
        };
        assert!(is_stuck(&pending));
        assert!(is_stuck(&blocked));
        assert!(is_stuck(&warning));
        assert!(is_stuck(&duplicate));
        assert!(!is_stuck(&downloading));
    }

    #[test]
    fn history_summary_flags_significant_mismatch() {
        let records = vec![
            HistoryRecord {
                event_type: HistoryEventType::DownloadIgnored,
                custom_format_score: Some(40),
                ..HistoryRecord::default()
            },
            HistoryRecord {
                event_type: HistoryEventType::Grabbed,
                custom_format_score: Some(100),
                ..HistoryRecord::default()
            },
        ];
        let summary = summarize_history(&records, 10);
        assert_eq!(summary.latest_difference, Some(60));
        assert!(summary.significant_mismatch);
        assert_eq!(summary.recent_grabs.len(), 1);
        assert_eq!(summary.recent_imports.len(), 1);

        let quiet = summarize_history(&records[1..], 10);
        assert_eq!(quiet.latest_difference, None);
        assert!(!quiet.significant_mismatch);
    }
}
