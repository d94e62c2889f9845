//! Caching decorator over any [`MediaLibrary`].
//!
//! # Design
//! - The queue snapshot and per-series format scores are cached; everything else passes through.
//! - Mutations invalidate the queue snapshot so the next scan sees fresh state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheStats, TtlCache};
use crate::library::{MediaLibrary, RemoveOptions};
use crate::model::{
    CustomFormat, Episode, EpisodeFile, HistoryRecord, QualityProfile, QueueItem, Series,
    SystemStatus,
};

const QUEUE_KEY: &str = "queue";

/// Lifetimes for cached lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Lifetime of the queue snapshot.
    pub queue_ttl: Duration,
    /// Lifetime of per-series format scores.
    pub score_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            queue_ttl: Duration::from_secs(60),
            score_ttl: Duration::from_secs(300),
        }
    }
}

/// [`MediaLibrary`] that caches the queue and format scores of an inner library.
pub struct CachedLibrary {
    inner: Arc<dyn MediaLibrary>,
    settings: CacheSettings,
    queue: TtlCache<Vec<QueueItem>>,
    scores: TtlCache<HashMap<i64, i64>>,
}

impl CachedLibrary {
    /// Wrap `inner` with the given cache lifetimes.
    #[must_use]
    pub fn new(inner: Arc<dyn MediaLibrary>, settings: CacheSettings) -> Self {
        Self {
            inner,
            settings,
            queue: TtlCache::new(settings.queue_ttl),
            scores: TtlCache::new(settings.score_ttl),
        }
    }

    /// Uncached library underneath the decorator.
    #[must_use]
    pub fn inner(&self) -> Arc<dyn MediaLibrary> {
        Arc::clone(&self.inner)
    }

    /// Counts for the score cache.
    #[must_use]
    pub fn score_cache_stats(&self) -> CacheStats {
        self.scores.stats()
    }

    /// Drop the cached queue snapshot.
    pub fn invalidate_queue(&self) {
        if self.queue.invalidate(QUEUE_KEY) {
            debug!("queue cache invalidated");
        }
    }
}

#[async_trait]
impl MediaLibrary for CachedLibrary {
    async fn system_status(&self) -> anyhow::Result<SystemStatus> {
        self.inner.system_status().await
    }

    async fn custom_formats(&self) -> anyhow::Result<Vec<CustomFormat>> {
        self.inner.custom_formats().await
    }

    async fn quality_profiles(&self) -> anyhow::Result<Vec<QualityProfile>> {
        self.inner.quality_profiles().await
    }

    async fn series_profile_map(&self) -> anyhow::Result<HashMap<i64, i64>> {
        self.inner.series_profile_map().await
    }

    async fn custom_format_scores(&self, series_id: i64) -> anyhow::Result<HashMap<i64, i64>> {
        let key = format!("scores:{series_id}");
        if let Some(scores) = self.scores.get(&key) {
            return Ok(scores);
        }
        let scores = self.inner.custom_format_scores(series_id).await?;
        self.scores
            .set(key, scores.clone(), self.settings.score_ttl);
        Ok(scores)
    }

    async fn queue(&self) -> anyhow::Result<Vec<QueueItem>> {
        if let Some(items) = self.queue.get(QUEUE_KEY) {
            return Ok(items);
        }
        let items = self.inner.queue().await?;
        self.queue
            .set(QUEUE_KEY, items.clone(), self.settings.queue_ttl);
        Ok(items)
    }

    async fn series_by_title(&self, title: &str) -> anyhow::Result<Option<Series>> {
        self.inner.series_by_title(title).await
    }

    async fn episode_by_number(
        &self,
        series_id: i64,
        season: i64,
        episode: i64,
    ) -> anyhow::Result<Option<Episode>> {
        self.inner
            .episode_by_number(series_id, season, episode)
            .await
    }

    async fn episode(&self, episode_id: i64) -> anyhow::Result<Episode> {
        self.inner.episode(episode_id).await
    }

    async fn history_for_episode(
        &self,
        episode_id: i64,
        limit: usize,
    ) -> anyhow::Result<Vec<HistoryRecord>> {
        self.inner.history_for_episode(episode_id, limit).await
    }

    async fn recent_history(&self, limit: usize) -> anyhow::Result<Vec<HistoryRecord>> {
        self.inner.recent_history(limit).await
    }

    async fn episode_file(&self, file_id: i64) -> anyhow::Result<Option<EpisodeFile>> {
        self.inner.episode_file(file_id).await
    }

    async fn force_import(
        &self,
        download_id: &str,
        episode_id: i64,
        quality: Option<Value>,
    ) -> anyhow::Result<bool> {
        let result = self
            .inner
            .force_import(download_id, episode_id, quality)
            .await;
        self.invalidate_queue();
        result
    }

    async fn remove_from_queue(
        &self,
        queue_id: i64,
        options: RemoveOptions,
    ) -> anyhow::Result<()> {
        let result = self.inner.remove_from_queue(queue_id, options).await;
        self.invalidate_queue();
        result
    }

    async fn clear_cache(&self) {
        self.queue.clear();
        self.scores.clear();
        self.inner.clear_cache().await;
    }
}
