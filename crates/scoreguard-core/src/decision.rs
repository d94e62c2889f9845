//! Score-comparison decision engine.
//!
//! # Design
//! - `decide` is pure: no I/O, no clock, deterministic for a given input.
//! - The positive threshold boundary is inclusive (`diff == threshold` forces an import);
//!   the negative boundary is exclusive (`diff == -threshold` waits).
//! - Format sets keep first-seen order so reasoning strings are stable.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use crate::model::{HistoryEventType, HistoryRecord};
use crate::tracker::TrackerClassifier;

/// Maximum number of missing formats quoted in force-import reasoning.
const MISSING_FORMATS_IN_REASONING: usize = 3;

/// Action selected for a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    /// Import the grabbed release over the current file.
    ForceImport,
    /// Remove the download from the queue and the download client.
    Remove,
    /// Drop the queue entry but leave the download seeding.
    Keep,
    /// Scores are within tolerance; do nothing yet.
    Wait,
    /// A score is unknown; observe only.
    Monitor,
}

impl DecisionAction {
    /// Stable label for logs, metrics and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ForceImport => "force_import",
            Self::Remove => "remove",
            Self::Keep => "keep",
            Self::Wait => "wait",
            Self::Monitor => "monitor",
        }
    }
}

impl Display for DecisionAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Immutable outcome of one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Selected action.
    pub action: DecisionAction,
    /// Score at grab time, when known.
    pub grab_score: Option<i64>,
    /// Score of the currently imported file, when known.
    pub current_score: Option<i64>,
    /// `grab_score - current_score` when both are known.
    pub score_difference: Option<i64>,
    /// Human-readable explanation.
    pub reasoning: String,
    /// Formats matched at grab time.
    pub grab_formats: Vec<String>,
    /// Formats matched by the current file.
    pub current_formats: Vec<String>,
    /// Formats present at grab time but absent from the current file.
    pub missing_formats: Vec<String>,
    /// Formats present on the current file but absent at grab time.
    pub extra_formats: Vec<String>,
    /// Whether the release came from a private tracker.
    pub is_private_tracker: bool,
}

/// Compare a grab score against the current file score and pick an action.
#[must_use]
pub fn decide(
    grab_score: Option<i64>,
    current_score: Option<i64>,
    is_private_tracker: bool,
    grab_formats: &[String],
    current_formats: &[String],
    threshold: i64,
) -> Decision {
    let missing_formats = format_difference(grab_formats, current_formats);
    let extra_formats = format_difference(current_formats, grab_formats);
    let score_difference = grab_score
        .zip(current_score)
        .map(|(grab, current)| grab.saturating_sub(current));

    let (action, reasoning) = match (grab_score, current_score, score_difference) {
        (Some(grab), Some(current), Some(diff)) => {
            select_action(grab, current, diff, threshold, is_private_tracker, &missing_formats)
        }
        _ => (
            DecisionAction::Monitor,
            unknown_score_reasoning(grab_score, current_score),
        ),
    };

    Decision {
        action,
        grab_score,
        current_score,
        score_difference,
        reasoning,
        grab_formats: dedup(grab_formats),
        current_formats: dedup(current_formats),
        missing_formats,
        extra_formats,
        is_private_tracker,
    }
}

fn select_action(
    grab: i64,
    current: i64,
    diff: i64,
    threshold: i64,
    is_private_tracker: bool,
    missing_formats: &[String],
) -> (DecisionAction, String) {
    if diff >= threshold {
        let mut reasoning = format!(
            "Grab score ({grab}) is {diff} points higher than current file ({current})"
        );
        if !missing_formats.is_empty() {
            let quoted: Vec<&str> = missing_formats
                .iter()
                .take(MISSING_FORMATS_IN_REASONING)
                .map(String::as_str)
                .collect();
            reasoning.push_str(". Missing formats: ");
            reasoning.push_str(&quoted.join(", "));
        }
        (DecisionAction::ForceImport, reasoning)
    } else if diff < threshold.saturating_neg() {
        if is_private_tracker {
            (
                DecisionAction::Keep,
                format!("Private tracker protection - keeping despite lower score (diff: {diff})"),
            )
        } else {
            (
                DecisionAction::Remove,
                format!(
                    "Public tracker with lower score (grab: {grab}, current: {current}, diff: {diff})"
                ),
            )
        }
    } else {
        (
            DecisionAction::Wait,
            format!("Score difference ({diff}) within tolerance threshold ({threshold})"),
        )
    }
}

fn unknown_score_reasoning(grab: Option<i64>, current: Option<i64>) -> String {
    let describe = |score: Option<i64>| score.map_or_else(|| "unknown".to_string(), |s| s.to_string());
    let which = match (grab, current) {
        (None, None) => "grab and current scores unknown",
        (None, Some(_)) => "grab score unknown",
        _ => "current score unknown",
    };
    format!(
        "Unable to determine scores ({which}; grab: {}, current: {})",
        describe(grab),
        describe(current)
    )
}

/// Items of `left` not present in `right`, deduplicated in first-seen order.
#[must_use]
pub fn format_difference(left: &[String], right: &[String]) -> Vec<String> {
    let exclude: HashSet<&str> = right.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    left.iter()
        .filter(|name| !exclude.contains(name.as_str()))
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

fn dedup(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Threshold-bound decision engine with tracker classification.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    threshold: i64,
    trackers: TrackerClassifier,
}

impl DecisionEngine {
    /// Build an engine for the configured threshold and tracker lists.
    #[must_use]
    pub const fn new(threshold: i64, trackers: TrackerClassifier) -> Self {
        Self {
            threshold,
            trackers,
        }
    }

    /// Configured force-import threshold.
    #[must_use]
    pub const fn threshold(&self) -> i64 {
        self.threshold
    }

    /// Tracker classifier used for the private-tracker check.
    #[must_use]
    pub const fn trackers(&self) -> &TrackerClassifier {
        &self.trackers
    }

    /// Classify the indexer and run [`decide`].
    #[must_use]
    pub fn evaluate(
        &self,
        grab_score: Option<i64>,
        current_score: Option<i64>,
        indexer: &str,
        grab_formats: &[String],
        current_formats: &[String],
    ) -> Decision {
        decide(
            grab_score,
            current_score,
            self.trackers.is_private(indexer),
            grab_formats,
            current_formats,
            self.threshold,
        )
    }
}

/// Grabs without a matching completed import, when grabs outnumber imports by more than one.
///
/// `history` is one episode's log ordered newest-first; the result keeps that order.
#[must_use]
pub fn detect_repeated_grabs(history: &[HistoryRecord]) -> Vec<HistoryRecord> {
    let grabs: Vec<&HistoryRecord> = history
        .iter()
        .filter(|event| event.event_type == HistoryEventType::Grabbed)
        .collect();
    let imported: HashSet<&str> = history
        .iter()
        .filter(|event| event.event_type == HistoryEventType::DownloadFolderImported)
        .filter_map(|event| event.download_id.as_deref())
        .collect();
    let import_count = history
        .iter()
        .filter(|event| event.event_type == HistoryEventType::DownloadFolderImported)
        .count();

    if grabs.len() <= import_count + 1 {
        return Vec::new();
    }

    grabs
        .into_iter()
        .filter(|grab| {
            grab.download_id
                .as_deref()
                .is_none_or(|id| !imported.contains(id))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn record(event_type: HistoryEventType, download_id: &str) -> HistoryRecord {
        HistoryRecord {
            event_type,
            download_id: Some(download_id.to_string()),
            ..HistoryRecord::default()
        }
    }

    #[test]
    fn higher_grab_score_forces_import_and_lists_missing_formats() {
        let decision = decide(
            Some(100),
            Some(80),
            false,
            &names(&["HDR", "Atmos"]),
            &names(&["x265"]),
            10,
        );
        assert_eq!(decision.action, DecisionAction::ForceImport);
        assert_eq!(decision.score_difference, Some(20));
        assert_eq!(decision.missing_formats, names(&["HDR", "Atmos"]));
        assert_eq!(decision.extra_formats, names(&["x265"]));
        assert!(decision.reasoning.contains("20 points higher"));
        assert!(decision.reasoning.contains("Missing formats: HDR, Atmos"));
    }

    #[test]
    fn reasoning_quotes_at_most_three_missing_formats() {
        let decision = decide(
            Some(50),
            Some(0),
            false,
            &names(&["A", "B", "C", "D"]),
            &[],
            10,
        );
        assert!(decision.reasoning.ends_with("Missing formats: A, B, C"));
        assert_eq!(decision.missing_formats.len(), 4);
    }

    #[test]
    fn private_tracker_with_lower_score_is_kept() {
        let decision = decide(Some(60), Some(100), true, &[], &[], 10);
        assert_eq!(decision.action, DecisionAction::Keep);
        assert!(decision.is_private_tracker);
    }

    #[test]
    fn public_tracker_with_lower_score_is_removed() {
        let decision = decide(Some(60), Some(100), false, &[], &[], 10);
        assert_eq!(decision.action, DecisionAction::Remove);
    }

    #[test]
    fn difference_within_tolerance_waits() {
        let decision = decide(Some(66), Some(80), false, &[], &[], 15);
        assert_eq!(decision.score_difference, Some(-14));
        assert_eq!(decision.action, DecisionAction::Wait);
    }

    #[test]
    fn boundaries_are_inclusive_above_and_exclusive_below() {
        for threshold in [1_i64, 5, 10, 250] {
            let at_positive = decide(Some(threshold), Some(0), false, &[], &[], threshold);
            assert_eq!(at_positive.action, DecisionAction::ForceImport);

            let at_negative = decide(Some(0), Some(threshold), false, &[], &[], threshold);
            assert_eq!(at_negative.action, DecisionAction::Wait);

            let below_negative = decide(Some(0), Some(threshold + 1), true, &[], &[], threshold);
            assert_eq!(below_negative.action, DecisionAction::Keep);

            let below_negative_public =
                decide(Some(0), Some(threshold + 1), false, &[], &[], threshold);
            assert_eq!(below_negative_public.action, DecisionAction::Remove);
        }
    }

    #[test]
    fn unknown_scores_monitor_regardless_of_threshold() {
        let no_grab = decide(None, Some(10), false, &[], &[], 0);
        assert_eq!(no_grab.action, DecisionAction::Monitor);
        assert!(no_grab.reasoning.contains("grab score unknown"));
        assert_eq!(no_grab.score_difference, None);

        let no_current = decide(Some(500), None, true, &[], &[], 10);
        assert_eq!(no_current.action, DecisionAction::Monitor);
        assert!(no_current.reasoning.contains("current score unknown"));

        let neither = decide(None, None, false, &[], &[], 10);
        assert!(neither.reasoning.contains("grab and current scores unknown"));
    }

    #[test]
    fn format_difference_is_set_difference() {
        let grab = names(&["A", "B", "B", "C"]);
        let current = names(&["C", "D"]);
        assert_eq!(format_difference(&grab, &current), names(&["A", "B"]));
        assert_eq!(format_difference(&current, &grab), names(&["D"]));
        assert!(format_difference(&[], &current).is_empty());
        assert_eq!(format_difference(&current, &[]), current);
    }

    #[test]
    fn engine_classifies_indexer_before_deciding() {
        let engine = DecisionEngine::new(10, TrackerClassifier::new(["bhd"], ["nyaa"]));
        let kept = engine.evaluate(Some(0), Some(50), "BHD", &[], &[]);
        assert_eq!(kept.action, DecisionAction::Keep);
        let removed = engine.evaluate(Some(0), Some(50), "Nyaa", &[], &[]);
        assert_eq!(removed.action, DecisionAction::Remove);
        assert_eq!(engine.threshold(), 10);
    }

    #[test]
    fn repeated_grabs_return_unimported_downloads() {
        let history = vec![
            record(HistoryEventType::Grabbed, "c"),
            record(HistoryEventType::Grabbed, "b"),
            record(HistoryEventType::DownloadFolderImported, "a"),
            record(HistoryEventType::Grabbed, "a"),
        ];
        let unimported = detect_repeated_grabs(&history);
        let ids: Vec<_> = unimported
            .iter()
            .filter_map(|event| event.download_id.as_deref())
            .collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[test]
    fn normal_grab_ratio_reports_nothing() {
        let history = vec![
            record(HistoryEventType::Grabbed, "b"),
            record(HistoryEventType::DownloadFolderImported, "a"),
            record(HistoryEventType::Grabbed, "a"),
        ];
        assert!(detect_repeated_grabs(&history).is_empty());
        assert!(detect_repeated_grabs(&[]).is_empty());
    }
}
