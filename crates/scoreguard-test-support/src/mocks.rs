//! In-memory stand-ins for the upstream library and the queue processor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use scoreguard_core::{
    CustomFormat, Episode, EpisodeFile, HistoryRecord, MediaLibrary, QualityProfile,
    QueueItem, QueueProcessor, RemoveOptions, Series, SystemStatus,
};
use serde_json::Value;

/// Manual import requested through [`FakeLibrary`].
#[derive(Debug, Clone, PartialEq)]
pub struct ForcedImport {
    /// Download correlation token.
    pub download_id: String,
    /// Target episode.
    pub episode_id: i64,
    /// Quality passed through.
    pub quality: Option<Value>,
}

#[derive(Default)]
struct LibraryState {
    queue: Vec<QueueItem>,
    history: Vec<HistoryRecord>,
    series: Vec<Series>,
    episodes: HashMap<i64, Episode>,
    files: HashMap<i64, EpisodeFile>,
    formats: Vec<CustomFormat>,
    profiles: Vec<QualityProfile>,
    forced: Vec<ForcedImport>,
    removed: Vec<(i64, RemoveOptions)>,
    import_result: Option<bool>,
    fail_queue: bool,
    fail_history: bool,
    remove_imported_from_queue: bool,
}

/// [`MediaLibrary`] backed by in-memory state with call recording.
#[derive(Default)]
pub struct FakeLibrary {
    state: Mutex<LibraryState>,
    queue_calls: AtomicUsize,
    history_calls: AtomicUsize,
}

impl FakeLibrary {
    /// Empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue.
    pub fn set_queue(&self, queue: Vec<QueueItem>) {
        self.lock().queue = queue;
    }

    /// Append history records (newest first overall order is the caller's concern).
    pub fn push_history(&self, records: impl IntoIterator<Item = HistoryRecord>) {
        self.lock().history.extend(records);
    }

    /// Register a series.
    pub fn add_series(&self, series: Series) {
        self.lock().series.push(series);
    }

    /// Register an episode.
    pub fn add_episode(&self, episode: Episode) {
        self.lock().episodes.insert(episode.id, episode);
    }

    /// Register an episode file.
    pub fn add_file(&self, file: EpisodeFile) {
        self.lock().files.insert(file.id, file);
    }

    /// Register a custom format.
    pub fn add_format(&self, format: CustomFormat) {
        self.lock().formats.push(format);
    }

    /// Register a quality profile.
    pub fn add_profile(&self, profile: QualityProfile) {
        self.lock().profiles.push(profile);
    }

    /// Override the result of `force_import` (defaults to `true`).
    pub fn set_import_result(&self, result: bool) {
        self.lock().import_result = Some(result);
    }

    /// Make queue lookups fail.
    pub fn fail_queue(&self, fail: bool) {
        self.lock().fail_queue = fail;
    }

    /// Make history lookups fail.
    pub fn fail_history(&self, fail: bool) {
        self.lock().fail_history = fail;
    }

    /// Drop a forced download from the queue, as the upstream service would after import.
    pub fn remove_imported_from_queue(&self, enabled: bool) {
        self.lock().remove_imported_from_queue = enabled;
    }

    /// Manual imports requested so far.
    #[must_use]
    pub fn forced_imports(&self) -> Vec<ForcedImport> {
        self.lock().forced.clone()
    }

    /// Queue removals requested so far.
    #[must_use]
    pub fn removals(&self) -> Vec<(i64, RemoveOptions)> {
        self.lock().removed.clone()
    }

    /// Number of queue fetches.
    #[must_use]
    pub fn queue_calls(&self) -> usize {
        self.queue_calls.load(Ordering::SeqCst)
    }

    /// Number of history fetches.
    #[must_use]
    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, LibraryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MediaLibrary for FakeLibrary {
    async fn system_status(&self) -> anyhow::Result<SystemStatus> {
        Ok(SystemStatus {
            version: Some("4.0.0".into()),
            app_name: Some("Sonarr".into()),
        })
    }

    async fn custom_formats(&self) -> anyhow::Result<Vec<CustomFormat>> {
        Ok(self.lock().formats.clone())
    }

    async fn quality_profiles(&self) -> anyhow::Result<Vec<QualityProfile>> {
        Ok(self.lock().profiles.clone())
    }

    async fn series_profile_map(&self) -> anyhow::Result<HashMap<i64, i64>> {
        Ok(self
            .lock()
            .series
            .iter()
            .filter_map(|series| series.quality_profile_id.map(|profile| (series.id, profile)))
            .collect())
    }

    async fn queue(&self) -> anyhow::Result<Vec<QueueItem>> {
        self.queue_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        if state.fail_queue {
            bail!("queue unavailable");
        }
        Ok(state.queue.clone())
    }

    async fn series_by_title(&self, title: &str) -> anyhow::Result<Option<Series>> {
        let needle = title.to_lowercase();
        Ok(self
            .lock()
            .series
            .iter()
            .find(|series| series.title.to_lowercase().contains(&needle))
            .cloned())
    }

    async fn episode_by_number(
        &self,
        series_id: i64,
        season: i64,
        episode: i64,
    ) -> anyhow::Result<Option<Episode>> {
        Ok(self
            .lock()
            .episodes
            .values()
            .find(|candidate| {
                candidate.series_id == Some(series_id)
                    && candidate.season_number == season
                    && candidate.episode_number == episode
            })
            .cloned())
    }

    async fn episode(&self, episode_id: i64) -> anyhow::Result<Episode> {
        self.lock()
            .episodes
            .get(&episode_id)
            .cloned()
            .ok_or_else(|| anyhow!("episode {episode_id} not found"))
    }

    async fn history_for_episode(
        &self,
        episode_id: i64,
        limit: usize,
    ) -> anyhow::Result<Vec<HistoryRecord>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        if state.fail_history {
            bail!("history unavailable");
        }
        Ok(state
            .history
            .iter()
            .filter(|record| record.episode_id() == Some(episode_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent_history(&self, limit: usize) -> anyhow::Result<Vec<HistoryRecord>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        if state.fail_history {
            bail!("history unavailable");
        }
        Ok(state.history.iter().take(limit).cloned().collect())
    }

    async fn episode_file(&self, file_id: i64) -> anyhow::Result<Option<EpisodeFile>> {
        Ok(self.lock().files.get(&file_id).cloned())
    }

    async fn force_import(
        &self,
        download_id: &str,
        episode_id: i64,
        quality: Option<Value>,
    ) -> anyhow::Result<bool> {
        let mut state = self.lock();
        state.forced.push(ForcedImport {
            download_id: download_id.to_string(),
            episode_id,
            quality,
        });
        let result = state.import_result.unwrap_or(true);
        if result && state.remove_imported_from_queue {
            state
                .queue
                .retain(|item| item.download_id.as_deref() != Some(download_id));
        }
        Ok(result)
    }

    async fn remove_from_queue(&self, queue_id: i64, options: RemoveOptions) -> anyhow::Result<()> {
        let mut state = self.lock();
        state.removed.push((queue_id, options));
        state.queue.retain(|item| item.id != Some(queue_id));
        Ok(())
    }
}

/// [`QueueProcessor`] that records what it was asked to process.
#[derive(Default)]
pub struct RecordingProcessor {
    processed: Mutex<Vec<QueueItem>>,
    downloads: Mutex<Vec<String>>,
    outcome: Mutex<Option<bool>>,
}

impl RecordingProcessor {
    /// Processor that reports success.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the reported result of `process_queue_item`.
    pub fn set_outcome(&self, success: bool) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(success);
    }

    /// Items handed to `process_queue_item`.
    #[must_use]
    pub fn processed(&self) -> Vec<QueueItem> {
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Downloads handed to `check_download_queue`.
    #[must_use]
    pub fn download_checks(&self) -> Vec<String> {
        self.downloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl QueueProcessor for RecordingProcessor {
    async fn process_queue_item(&self, item: &QueueItem) -> anyhow::Result<bool> {
        self.processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item.clone());
        Ok(self
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or(true))
    }

    async fn check_download_queue(&self, download_id: &str) -> anyhow::Result<bool> {
        self.downloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(download_id.to_string());
        Ok(true)
    }
}
