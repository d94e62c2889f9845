//! Grab/import correlation and delayed reconciliation.
//!
//! # Design
//! - Grab notifications cache a [`GrabRecord`] per episode and schedule a reconciliation
//!   check; import notifications clear the record.
//! - A check re-reads the table when it fires: a cleared or superseded record ends the
//!   check before any upstream call. Supersession is by table generation, not download id.
//! - A download still in flight keeps its record and is checked again after another delay.
//! - Reconciliation reads the uncached library so queue state is never stale.
//! - Every check resolves to a [`ReconciliationOutcome`] published on the event bus.

mod grabs;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use scoreguard_events::{Event, EventBus, ReconciliationOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use grabs::GrabTable;
pub use scheduler::{CheckHandler, ReconciliationScheduler, ScheduledCheck};

use crate::library::{MediaLibrary, QueueProcessor};
use crate::model::{GrabRecord, HistoryEventType, QueueItem};

/// History entries consulted when looking for a silent import.
pub const SILENT_IMPORT_HISTORY_LIMIT: usize = 10;

/// Timing and threshold settings for the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationSettings {
    /// Delay before a grab is reconciled.
    pub import_check_delay: Duration,
    /// Delay before a manual-interaction download check.
    pub manual_check_delay: Duration,
    /// Score gap that flags an import as worse than its grab.
    pub threshold: i64,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            import_check_delay: Duration::from_secs(600),
            manual_check_delay: Duration::from_secs(5),
            threshold: 10,
        }
    }
}

/// Release data carried by a grab notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrabNotice {
    /// Episodes covered by the release.
    pub episode_ids: Vec<i64>,
    /// Download correlation token.
    pub download_id: Option<String>,
    /// Download client that received the release.
    pub download_client: Option<String>,
    /// Custom-format score at grab time.
    pub score: i64,
    /// Matched custom-format names.
    pub format_names: Vec<String>,
    /// Release title.
    pub release_title: String,
    /// Indexer the release came from.
    pub indexer: String,
    /// Series title.
    pub series_title: String,
}

/// Correlates grab and import notifications for the same episodes.
pub struct Correlator {
    grabs: GrabTable,
    library: Arc<dyn MediaLibrary>,
    processor: Arc<dyn QueueProcessor>,
    events: EventBus,
    settings: CorrelationSettings,
    scheduler: ReconciliationScheduler,
}

impl Correlator {
    /// Build the pipeline and spawn its scheduler driver.
    ///
    /// `library` should be the uncached client. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new(
        library: Arc<dyn MediaLibrary>,
        processor: Arc<dyn QueueProcessor>,
        events: EventBus,
        settings: CorrelationSettings,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            grabs: GrabTable::new(),
            library,
            processor,
            events,
            settings,
            scheduler: ReconciliationScheduler::spawn(weak.clone(), shutdown),
        })
    }

    /// Cache a grab for every listed episode and schedule their reconciliation.
    ///
    /// Returns the number of episodes cached.
    #[must_use]
    pub fn record_grab(&self, notice: GrabNotice) -> usize {
        let received_at = Utc::now();
        let check_after_secs = self.settings.import_check_delay.as_secs();
        for &episode_id in &notice.episode_ids {
            let record = GrabRecord {
                episode_id,
                download_id: notice.download_id.clone(),
                score: notice.score,
                format_names: notice.format_names.clone(),
                release_title: notice.release_title.clone(),
                indexer: notice.indexer.clone(),
                download_client: notice.download_client.clone(),
                series_title: notice.series_title.clone(),
                received_at,
            };
            let (generation, previous) = self.grabs.insert(record);
            if let Some(previous) = previous {
                debug!(
                    episode_id,
                    previous_download_id = previous.download_id.as_deref().unwrap_or_default(),
                    "grab replaced earlier pending grab"
                );
            }
            self.schedule_episode_check(episode_id, notice.download_id.clone(), generation);
            info!(
                episode_id,
                download_id = notice.download_id.as_deref().unwrap_or_default(),
                score = notice.score,
                check_after_secs,
                "grab cached"
            );
            let _ = self.events.publish(Event::GrabCached {
                episode_id,
                download_id: notice.download_id.clone(),
                score: notice.score,
                check_after_secs,
            });
        }
        notice.episode_ids.len()
    }

    /// Confirm an import for an episode, clearing its pending grab.
    ///
    /// Returns the cleared record, if one was pending.
    #[must_use]
    pub fn record_import(&self, episode_id: i64, import_score: i64) -> Option<GrabRecord> {
        let record = self.grabs.remove(episode_id);
        let grab_score = record.as_ref().map(|record| record.score);
        if let Some(grab_score) = grab_score {
            let difference = grab_score.saturating_sub(import_score);
            info!(episode_id, grab_score, import_score, difference, "import confirmed");
            if difference > self.settings.threshold {
                warn!(
                    episode_id,
                    grab_score,
                    import_score,
                    "imported file scores lower than its grab"
                );
                let _ = self.events.publish(Event::ScoreMismatch {
                    episode_id,
                    grab_score,
                    import_score,
                });
            }
        } else {
            debug!(episode_id, import_score, "import without pending grab");
        }
        let _ = self.events.publish(Event::ImportConfirmed {
            episode_id,
            grab_score,
            import_score,
        });
        record
    }

    /// Schedule a short-delay queue check for a download that needs manual intervention.
    pub fn request_download_check(&self, download_id: &str) {
        info!(
            download_id,
            delay_secs = self.settings.manual_check_delay.as_secs(),
            "scheduling download check"
        );
        self.scheduler.schedule(
            ScheduledCheck::Download {
                download_id: download_id.to_string(),
            },
            self.settings.manual_check_delay,
        );
    }

    fn schedule_episode_check(
        &self,
        episode_id: i64,
        download_id: Option<String>,
        generation: u64,
    ) {
        self.scheduler.schedule(
            ScheduledCheck::Episode {
                episode_id,
                download_id,
                generation,
            },
            self.settings.import_check_delay,
        );
    }

    /// Number of pending grabs.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.grabs.len()
    }

    /// Pending grab for an episode.
    #[must_use]
    pub fn pending_grab(&self, episode_id: i64) -> Option<GrabRecord> {
        self.grabs.get(episode_id)
    }

    /// Checks waiting on the scheduler.
    #[must_use]
    pub fn scheduled_checks(&self) -> usize {
        self.scheduler.pending()
    }

    /// Stop scheduling and drop all pending grabs.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        let dropped = self.grabs.len();
        self.grabs.clear();
        info!(dropped, "correlation pipeline stopped");
    }

    /// Re-validate a pending grab against upstream state.
    ///
    /// `generation` is the grab-table generation the check was scheduled for; any other
    /// current generation means a newer grab owns the episode.
    pub async fn reconcile(
        &self,
        episode_id: i64,
        download_id: Option<&str>,
        generation: u64,
    ) -> ReconciliationOutcome {
        let outcome = self.resolve(episode_id, download_id, generation).await;
        info!(
            episode_id,
            download_id = download_id.unwrap_or_default(),
            outcome = outcome.as_str(),
            "reconciliation finished"
        );
        let _ = self.events.publish(Event::ReconciliationResolved {
            episode_id,
            download_id: download_id.map(ToString::to_string),
            outcome,
        });
        if outcome == ReconciliationOutcome::StillQueued {
            let download_id = download_id.map(ToString::to_string);
            self.schedule_episode_check(episode_id, download_id, generation);
        }
        outcome
    }

    async fn resolve(
        &self,
        episode_id: i64,
        download_id: Option<&str>,
        generation: u64,
    ) -> ReconciliationOutcome {
        let Some((current, record)) = self.grabs.get_stamped(episode_id) else {
            debug!(episode_id, "grab already cleared");
            return ReconciliationOutcome::AlreadyCleared;
        };
        if current != generation {
            debug!(episode_id, "grab superseded by a newer grab");
            return ReconciliationOutcome::Superseded;
        }
        info!(
            episode_id,
            release = %record.release_title,
            "checking delayed import"
        );

        let queue = match self.library.queue().await {
            Ok(queue) => queue,
            Err(err) => {
                error!(episode_id, error = %err, "queue lookup failed during reconciliation");
                return ReconciliationOutcome::Failed;
            }
        };

        if let Some(item) = find_queue_item(&queue, episode_id, download_id) {
            return self.handle_queued(&record, generation, item).await;
        }

        let history = match self
            .library
            .history_for_episode(episode_id, SILENT_IMPORT_HISTORY_LIMIT)
            .await
        {
            Ok(history) => history,
            Err(err) => {
                error!(episode_id, error = %err, "history lookup failed during reconciliation");
                return ReconciliationOutcome::Failed;
            }
        };
        let imported = download_id.is_some()
            && history.iter().any(|event| {
                event.event_type == HistoryEventType::DownloadFolderImported
                    && event.download_id.as_deref() == download_id
            });

        if !self.grabs.remove_if(episode_id, generation) {
            debug!(episode_id, "grab changed while reconciling");
            return if self.grabs.get(episode_id).is_some() {
                ReconciliationOutcome::Superseded
            } else {
                ReconciliationOutcome::AlreadyCleared
            };
        }
        if imported {
            info!(episode_id, "imported without notification");
            ReconciliationOutcome::ImportedSilently
        } else {
            warn!(
                episode_id,
                download_id = download_id.unwrap_or_default(),
                release = %record.release_title,
                "grab neither imported nor queued"
            );
            ReconciliationOutcome::Orphaned
        }
    }

    async fn handle_queued(
        &self,
        record: &GrabRecord,
        generation: u64,
        item: &QueueItem,
    ) -> ReconciliationOutcome {
        let status = item.status.as_deref().unwrap_or("unknown");
        let state = item.tracked_download_state.as_deref().unwrap_or("unknown");
        warn!(
            episode_id = record.episode_id,
            status,
            state,
            delay_secs = self.settings.import_check_delay.as_secs(),
            "download still queued after delay"
        );
        if status != "completed" && state != "importPending" {
            return ReconciliationOutcome::StillQueued;
        }

        info!(episode_id = record.episode_id, "completed download not importing; analysing");
        match self.processor.process_queue_item(item).await {
            Ok(true) => {
                let _ = self.grabs.remove_if(record.episode_id, generation);
                ReconciliationOutcome::Processed
            }
            Ok(false) => ReconciliationOutcome::Failed,
            Err(err) => {
                error!(episode_id = record.episode_id, error = %err, "queue item processing failed");
                ReconciliationOutcome::Failed
            }
        }
    }

    async fn check_download(&self, download_id: &str) {
        match self.processor.check_download_queue(download_id).await {
            Ok(found) => debug!(download_id, found, "download check finished"),
            Err(err) => error!(download_id, error = %err, "download check failed"),
        }
    }
}

#[async_trait]
impl CheckHandler for Correlator {
    async fn run_check(&self, check: ScheduledCheck) {
        match check {
            ScheduledCheck::Episode {
                episode_id,
                download_id,
                generation,
            } => {
                let _ = self
                    .reconcile(episode_id, download_id.as_deref(), generation)
                    .await;
            }
            ScheduledCheck::Download { download_id } => self.check_download(&download_id).await,
        }
    }
}

fn find_queue_item<'a>(
    queue: &'a [QueueItem],
    episode_id: i64,
    download_id: Option<&str>,
) -> Option<&'a QueueItem> {
    let download_id = download_id?;
    queue.iter().find(|item| {
        item.download_id.as_deref() == Some(download_id)
            && item.episode.as_ref().map(|episode| episode.id) == Some(episode_id)
    })
}
