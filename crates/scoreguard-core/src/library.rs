//! Capability traits at the upstream seam.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::model::{
    CustomFormat, Episode, EpisodeFile, HistoryRecord, QualityProfile, QueueItem, Series,
    SystemStatus,
};

/// Flags accepted by [`MediaLibrary::remove_from_queue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Also delete the download from the download client.
    pub remove_from_client: bool,
    /// Add the release to the upstream blocklist.
    pub blocklist: bool,
}

impl RemoveOptions {
    /// Remove from the queue and the download client.
    #[must_use]
    pub const fn from_client() -> Self {
        Self {
            remove_from_client: true,
            blocklist: false,
        }
    }

    /// Remove from the queue only, leaving the download seeding.
    #[must_use]
    pub const fn queue_only() -> Self {
        Self {
            remove_from_client: false,
            blocklist: false,
        }
    }
}

/// Read and mutate access to the upstream media-management service.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Upstream system status; doubles as a connectivity probe.
    async fn system_status(&self) -> anyhow::Result<SystemStatus>;

    /// Every custom format definition.
    async fn custom_formats(&self) -> anyhow::Result<Vec<CustomFormat>>;

    /// Every quality profile with its format weights.
    async fn quality_profiles(&self) -> anyhow::Result<Vec<QualityProfile>>;

    /// Map of series id to quality profile id.
    async fn series_profile_map(&self) -> anyhow::Result<HashMap<i64, i64>>;

    /// Map of custom-format id to score for the series' quality profile.
    ///
    /// Unknown series or profiles yield an empty map.
    async fn custom_format_scores(&self, series_id: i64) -> anyhow::Result<HashMap<i64, i64>> {
        let profiles = self.series_profile_map().await?;
        let Some(profile_id) = profiles.get(&series_id).copied() else {
            return Ok(HashMap::new());
        };
        let scores = self
            .quality_profiles()
            .await?
            .into_iter()
            .find(|profile| profile.id == profile_id)
            .map(|profile| {
                profile
                    .format_items
                    .into_iter()
                    .map(|item| (item.format, item.score))
                    .collect()
            })
            .unwrap_or_default();
        Ok(scores)
    }

    /// Current download queue.
    async fn queue(&self) -> anyhow::Result<Vec<QueueItem>>;

    /// First series whose title contains `title` (case-insensitive).
    async fn series_by_title(&self, title: &str) -> anyhow::Result<Option<Series>>;

    /// Episode by season and episode number.
    async fn episode_by_number(
        &self,
        series_id: i64,
        season: i64,
        episode: i64,
    ) -> anyhow::Result<Option<Episode>>;

    /// Episode by identifier.
    async fn episode(&self, episode_id: i64) -> anyhow::Result<Episode>;

    /// History for one episode, newest first.
    async fn history_for_episode(
        &self,
        episode_id: i64,
        limit: usize,
    ) -> anyhow::Result<Vec<HistoryRecord>>;

    /// Most recent history across the library, newest first.
    async fn recent_history(&self, limit: usize) -> anyhow::Result<Vec<HistoryRecord>>;

    /// Imported file details; `None` when the file no longer exists.
    async fn episode_file(&self, file_id: i64) -> anyhow::Result<Option<EpisodeFile>>;

    /// Manually import a download for an episode. Returns `false` when nothing was importable.
    async fn force_import(
        &self,
        download_id: &str,
        episode_id: i64,
        quality: Option<Value>,
    ) -> anyhow::Result<bool>;

    /// Remove a queue entry.
    async fn remove_from_queue(&self, queue_id: i64, options: RemoveOptions)
    -> anyhow::Result<()>;

    /// Drop memoized lookups; the default keeps nothing to drop.
    async fn clear_cache(&self) {}
}

/// Handles queue entries selected by the correlation pipeline.
#[async_trait]
pub trait QueueProcessor: Send + Sync {
    /// Analyse one queue item and execute the resulting action. Returns whether it succeeded.
    async fn process_queue_item(&self, item: &QueueItem) -> anyhow::Result<bool>;

    /// Find a download in the queue and process it. Returns whether it was found.
    async fn check_download_queue(&self, download_id: &str) -> anyhow::Result<bool>;
}
