//! Domain records and upstream wire models.
//!
//! # Design
//! - Upstream payloads are deserialised leniently: every field carries a serde default so
//!   partial records degrade to "unknown" instead of failing the whole response.
//! - Custom formats arrive either as bare names (notifications) or `{id, name}` objects
//!   (REST resources); both collapse into [`CustomFormatRef`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Outstanding grab awaiting import confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrabRecord {
    /// Episode the grab targets; the table key.
    pub episode_id: i64,
    /// Opaque download correlation token.
    pub download_id: Option<String>,
    /// Custom-format score at grab time.
    pub score: i64,
    /// Custom-format names matched at grab time, in notification order.
    pub format_names: Vec<String>,
    /// Release title that was grabbed.
    pub release_title: String,
    /// Indexer (tracker) the release came from.
    pub indexer: String,
    /// Download client that received the release.
    pub download_client: Option<String>,
    /// Series title for log context.
    pub series_title: String,
    /// When the grab notification arrived.
    pub received_at: DateTime<Utc>,
}

/// Reference to a custom format, by name and optionally by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomFormatRef {
    /// Upstream custom-format identifier.
    pub id: Option<i64>,
    /// Display name.
    pub name: String,
}

impl CustomFormatRef {
    /// Build a reference from a bare format name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    /// Build a reference with an upstream identifier.
    #[must_use]
    pub fn with_id(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }
}

impl<'de> Deserialize<'de> for CustomFormatRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Name(String),
            Object {
                #[serde(default)]
                id: Option<i64>,
                #[serde(default)]
                name: Option<String>,
            },
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Name(name) => Self::named(name),
            Raw::Object { id, name } => Self {
                id,
                name: name.unwrap_or_else(|| "Unknown".to_string()),
            },
        })
    }
}

/// Collect format names in their original order.
#[must_use]
pub fn format_names(formats: &[CustomFormatRef]) -> Vec<String> {
    formats.iter().map(|format| format.name.clone()).collect()
}

/// Series resource (subset).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Series {
    /// Series identifier.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// Quality profile assigned to the series.
    pub quality_profile_id: Option<i64>,
}

/// Episode resource (subset).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Episode {
    /// Episode identifier.
    pub id: i64,
    /// Owning series identifier.
    pub series_id: Option<i64>,
    /// Season number.
    pub season_number: i64,
    /// Episode number within the season.
    pub episode_number: i64,
    /// Episode title.
    pub title: Option<String>,
    /// Whether a file is currently imported for the episode.
    pub has_file: bool,
    /// Identifier of the imported file, when present.
    pub episode_file_id: Option<i64>,
}

impl Episode {
    /// `S01E02`-style label.
    #[must_use]
    pub fn label(&self) -> String {
        format!("S{:02}E{:02}", self.season_number, self.episode_number)
    }
}

/// Status message attached to a queue item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusMessage {
    /// Message heading.
    pub title: Option<String>,
    /// Individual diagnostic lines.
    pub messages: Vec<String>,
}

/// Item in the upstream download queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueItem {
    /// Queue entry identifier.
    pub id: Option<i64>,
    /// Download correlation token.
    pub download_id: Option<String>,
    /// Release title.
    pub title: Option<String>,
    /// Download client status (`downloading`, `completed`, ...).
    pub status: Option<String>,
    /// Tracked download status (`ok`, `warning`, `error`).
    pub tracked_download_status: Option<String>,
    /// Tracked download state (`importPending`, `importBlocked`, ...).
    pub tracked_download_state: Option<String>,
    /// Diagnostic messages reported for the item.
    pub status_messages: Vec<StatusMessage>,
    /// Embedded episode resource.
    pub episode: Option<Episode>,
    /// Episode identifier when the episode is not embedded.
    pub episode_id: Option<i64>,
    /// Embedded series resource.
    pub series: Option<Series>,
    /// Series identifier when the series is not embedded.
    pub series_id: Option<i64>,
    /// Total size in bytes.
    pub size: Option<f64>,
    /// Quality object, passed through verbatim to manual imports.
    pub quality: Option<Value>,
    /// Indexer that supplied the release.
    pub indexer: Option<String>,
}

impl QueueItem {
    /// Episode identifier from the embedded episode or the flat field.
    #[must_use]
    pub fn episode_id(&self) -> Option<i64> {
        self.episode
            .as_ref()
            .map(|episode| episode.id)
            .or(self.episode_id)
    }

    /// Series identifier from the embedded series or the flat field.
    #[must_use]
    pub fn series_id(&self) -> Option<i64> {
        self.series.as_ref().map(|series| series.id).or(self.series_id)
    }

    /// Series title or `Unknown`.
    #[must_use]
    pub fn series_title(&self) -> &str {
        self.series
            .as_ref()
            .map_or("Unknown", |series| series.title.as_str())
    }

    /// Episode label or `N/A`.
    #[must_use]
    pub fn episode_label(&self) -> String {
        self.episode
            .as_ref()
            .map_or_else(|| "N/A".to_string(), Episode::label)
    }
}

/// History event discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HistoryEventType {
    /// Release handed to a download client.
    Grabbed,
    /// Download imported into the library.
    DownloadFolderImported,
    /// Download failed in the client.
    DownloadFailed,
    /// Import was skipped.
    DownloadIgnored,
    /// Episode file deleted.
    EpisodeFileDeleted,
    /// Episode file renamed.
    EpisodeFileRenamed,
    /// Any other event type.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Free-form history payload (subset).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryData {
    /// Indexer recorded for grab events.
    pub indexer: Option<String>,
}

/// Entry in the upstream history log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryRecord {
    /// History entry identifier.
    pub id: i64,
    /// Episode the entry belongs to.
    pub episode_id: Option<i64>,
    /// Series the entry belongs to.
    pub series_id: Option<i64>,
    /// Event discriminator.
    pub event_type: HistoryEventType,
    /// Download correlation token.
    pub download_id: Option<String>,
    /// Release title.
    pub source_title: Option<String>,
    /// Event timestamp.
    pub date: Option<DateTime<Utc>>,
    /// Custom-format score recorded with the event.
    pub custom_format_score: Option<i64>,
    /// Custom formats recorded with the event.
    pub custom_formats: Vec<CustomFormatRef>,
    /// Event-specific data.
    pub data: HistoryData,
    /// Embedded episode resource.
    pub episode: Option<Episode>,
}

impl HistoryRecord {
    /// Episode identifier from the flat field or the embedded episode.
    #[must_use]
    pub fn episode_id(&self) -> Option<i64> {
        self.episode_id
            .or_else(|| self.episode.as_ref().map(|episode| episode.id))
    }

    /// Indexer name, empty when not recorded.
    #[must_use]
    pub fn indexer(&self) -> &str {
        self.data.indexer.as_deref().unwrap_or_default()
    }
}

/// Imported episode file (subset).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EpisodeFile {
    /// File identifier.
    pub id: i64,
    /// Path relative to the series folder.
    pub relative_path: Option<String>,
    /// Custom-format score of the file.
    pub custom_format_score: Option<i64>,
    /// Custom formats matched by the file.
    pub custom_formats: Vec<CustomFormatRef>,
    /// Quality object.
    pub quality: Option<Value>,
}

/// Custom format definition (subset).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomFormat {
    /// Format identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
}

/// Score weight of one custom format inside a quality profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatItem {
    /// Custom-format identifier.
    pub format: i64,
    /// Format name.
    pub name: Option<String>,
    /// Score contributed when the format matches.
    pub score: i64,
}

/// Quality profile (subset).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityProfile {
    /// Profile identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Per-format score weights.
    pub format_items: Vec<FormatItem>,
}

/// Upstream system status (subset).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemStatus {
    /// Upstream application version.
    pub version: Option<String>,
    /// Upstream application name.
    pub app_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn custom_format_refs_accept_names_and_objects() -> Result<(), serde_json::Error> {
        let formats: Vec<CustomFormatRef> =
            serde_json::from_value(json!(["HDR", {"id": 4, "name": "Atmos"}, {"id": 9}]))?;
        assert_eq!(
            formats,
            vec![
                CustomFormatRef::named("HDR"),
                CustomFormatRef::with_id(4, "Atmos"),
                CustomFormatRef::with_id(9, "Unknown"),
            ]
        );
        Ok(())
    }

    #[test]
    fn queue_item_tolerates_partial_payloads() -> Result<(), serde_json::Error> {
        let item: QueueItem = serde_json::from_value(json!({
            "id": 12,
            "downloadId": "ABC",
            "trackedDownloadState": "importPending",
            "episode": {"id": 100, "seasonNumber": 1, "episodeNumber": 3},
            "statusMessages": [{"title": "x", "messages": ["Episode file already imported"]}],
            "unexpected": true
        }))?;
        assert_eq!(item.episode_id(), Some(100));
        assert_eq!(item.series_id(), None);
        assert_eq!(item.series_title(), "Unknown");
        assert_eq!(item.episode_label(), "S01E03");
        assert_eq!(item.status_messages[0].messages.len(), 1);
        Ok(())
    }

    #[test]
    fn history_event_types_fall_back_to_unknown() -> Result<(), serde_json::Error> {
        let records: Vec<HistoryRecord> = serde_json::from_value(json!([
            {"eventType": "grabbed", "downloadId": "a", "data": {"indexer": "BeyondHD (API)"}},
            {"eventType": "downloadFolderImported", "downloadId": "a"},
            {"eventType": "seriesFolderImported"}
        ]))?;
        assert_eq!(records[0].event_type, HistoryEventType::Grabbed);
        assert_eq!(records[0].indexer(), "BeyondHD (API)");
        assert_eq!(
            records[1].event_type,
            HistoryEventType::DownloadFolderImported
        );
        assert_eq!(records[2].event_type, HistoryEventType::Unknown);
        assert_eq!(records[2].indexer(), "");
        Ok(())
    }
}
