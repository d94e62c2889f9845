//! Score analysis for queue items.
//!
//! # Design
//! - Grab data comes from the episode history; current-file data from the episode resource.
//! - A recorded score of zero with matched formats falls back to summing the series'
//!   profile weights for those formats.
//! - Failures while reading the current file degrade to "unknown", which yields `monitor`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::decision::{Decision, DecisionEngine};
use crate::library::MediaLibrary;
use crate::model::{CustomFormatRef, HistoryEventType, HistoryRecord, QueueItem, format_names};

/// Number of history entries consulted per episode.
pub const HISTORY_LIMIT: usize = 50;

/// Score and format names observed for one side of the comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreSnapshot {
    /// Score, `None` when unknown.
    pub score: Option<i64>,
    /// Matched format names.
    pub formats: Vec<String>,
}

/// Derives decisions for queue items from upstream history and file state.
#[derive(Clone)]
pub struct ScoreAnalyzer {
    library: Arc<dyn MediaLibrary>,
    engine: DecisionEngine,
}

impl ScoreAnalyzer {
    /// Build an analyzer over `library`.
    #[must_use]
    pub fn new(library: Arc<dyn MediaLibrary>, engine: DecisionEngine) -> Self {
        Self { library, engine }
    }

    /// Decision engine used by the analyzer.
    #[must_use]
    pub const fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Analyse a queue item and return the decision.
    ///
    /// # Errors
    ///
    /// Returns an error when the episode history cannot be fetched.
    pub async fn analyze(&self, item: &QueueItem) -> anyhow::Result<Decision> {
        let episode_id = item.episode_id();
        let series_id = item.series_id();
        let history = match episode_id {
            Some(id) => self.library.history_for_episode(id, HISTORY_LIMIT).await?,
            None => Vec::new(),
        };

        let grab_event = find_grab(&history, item.download_id.as_deref());
        let grab = match grab_event {
            Some(event) => {
                self.resolve_score(event.custom_format_score, &event.custom_formats, series_id)
                    .await
            }
            None => ScoreSnapshot::default(),
        };
        let indexer = grab_event.map_or("", HistoryRecord::indexer);

        let current = match episode_id {
            Some(id) => self.current_file_score(id, series_id).await,
            None => ScoreSnapshot::default(),
        };

        let decision = self.engine.evaluate(
            grab.score,
            current.score,
            indexer,
            &grab.formats,
            &current.formats,
        );
        debug!(
            download_id = item.download_id.as_deref().unwrap_or_default(),
            episode_id,
            action = %decision.action,
            grab_score = decision.grab_score,
            current_score = decision.current_score,
            "queue item analysed"
        );
        Ok(decision)
    }

    /// Score of the file currently imported for an episode, unknown when there is none.
    pub async fn current_file_score(&self, episode_id: i64, series_id: Option<i64>) -> ScoreSnapshot {
        let episode = match self.library.episode(episode_id).await {
            Ok(episode) => episode,
            Err(err) => {
                warn!(episode_id, error = %err, "failed to load episode; current score unknown");
                return ScoreSnapshot::default();
            }
        };
        let Some(file_id) = episode.episode_file_id.filter(|_| episode.has_file) else {
            return ScoreSnapshot::default();
        };
        let series_id = series_id.or(episode.series_id);
        match self.library.episode_file(file_id).await {
            Ok(Some(file)) => {
                self.resolve_score(file.custom_format_score, &file.custom_formats, series_id)
                    .await
            }
            Ok(None) => ScoreSnapshot::default(),
            Err(err) => {
                warn!(episode_id, file_id, error = %err, "failed to load episode file; current score unknown");
                ScoreSnapshot::default()
            }
        }
    }

    async fn resolve_score(
        &self,
        recorded: Option<i64>,
        formats: &[CustomFormatRef],
        series_id: Option<i64>,
    ) -> ScoreSnapshot {
        let names = format_names(formats);
        let mut score = recorded.unwrap_or(0);
        if score == 0
            && !formats.is_empty()
            && let Some(series_id) = series_id
        {
            score = self.summed_profile_score(series_id, formats).await;
        }
        ScoreSnapshot {
            score: Some(score),
            formats: names,
        }
    }

    async fn summed_profile_score(&self, series_id: i64, formats: &[CustomFormatRef]) -> i64 {
        let weights: HashMap<i64, i64> = match self.library.custom_format_scores(series_id).await {
            Ok(weights) => weights,
            Err(err) => {
                warn!(series_id, error = %err, "failed to load format scores");
                return 0;
            }
        };
        formats
            .iter()
            .filter_map(|format| format.id)
            .filter_map(|id| weights.get(&id))
            .sum()
    }
}

/// First grab event for `download_id`, or the newest grab when the item carries no id.
#[must_use]
pub fn find_grab<'a>(
    history: &'a [HistoryRecord],
    download_id: Option<&str>,
) -> Option<&'a HistoryRecord> {
    history
        .iter()
        .filter(|event| event.event_type == HistoryEventType::Grabbed)
        .find(|event| download_id.is_none_or(|id| event.download_id.as_deref() == Some(id)))
}
