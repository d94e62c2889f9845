//! Inbound notification bodies.
//!
//! Every field is optional on the wire; absent scores read as zero and absent
//! names as `Unknown`.

use scoreguard_core::{CustomFormatRef, GrabNotice, StatusMessage, model::format_names};
use serde::Deserialize;

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Notification {
    pub(crate) event_type: Option<String>,
    pub(crate) download_id: Option<String>,
    pub(crate) download_client: Option<String>,
    pub(crate) series: Option<NotificationSeries>,
    pub(crate) episodes: Vec<NotificationEpisode>,
    pub(crate) release: Option<NotificationRelease>,
    pub(crate) episode_file: Option<NotificationFile>,
    pub(crate) download_status_messages: Vec<StatusMessage>,
    pub(crate) level: Option<String>,
    pub(crate) message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct NotificationSeries {
    pub(crate) title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct NotificationEpisode {
    pub(crate) id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct NotificationRelease {
    pub(crate) custom_format_score: Option<i64>,
    pub(crate) custom_formats: Vec<CustomFormatRef>,
    pub(crate) release_title: Option<String>,
    pub(crate) indexer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct NotificationFile {
    pub(crate) custom_format_score: Option<i64>,
}

impl Notification {
    pub(crate) fn event_type(&self) -> &str {
        self.event_type.as_deref().unwrap_or(UNKNOWN)
    }

    pub(crate) fn episode_ids(&self) -> Vec<i64> {
        self.episodes.iter().filter_map(|episode| episode.id).collect()
    }

    pub(crate) fn series_title(&self) -> String {
        self.series
            .as_ref()
            .and_then(|series| series.title.clone())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub(crate) fn import_score(&self) -> i64 {
        self.episode_file
            .as_ref()
            .and_then(|file| file.custom_format_score)
            .unwrap_or_default()
    }

    pub(crate) fn grab_notice(&self) -> GrabNotice {
        let release = self.release.as_ref();
        GrabNotice {
            episode_ids: self.episode_ids(),
            download_id: self.download_id.clone(),
            download_client: self.download_client.clone(),
            score: release
                .and_then(|release| release.custom_format_score)
                .unwrap_or_default(),
            format_names: release
                .map(|release| format_names(&release.custom_formats))
                .unwrap_or_default(),
            release_title: release
                .and_then(|release| release.release_title.clone())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            indexer: release
                .and_then(|release| release.indexer.clone())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            series_title: self.series_title(),
        }
    }

    pub(crate) fn status_messages(&self) -> Vec<String> {
        self.download_status_messages
            .iter()
            .flat_map(|status| status.messages.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn grab_notice_reads_release_fields() -> Result<(), serde_json::Error> {
        let notification: Notification = serde_json::from_value(json!({
            "eventType": "Grab",
            "downloadId": "abc",
            "downloadClient": "qBittorrent",
            "series": {"title": "Show"},
            "episodes": [{"id": 1}, {"id": 2}, {"seasonNumber": 1}],
            "release": {
                "releaseTitle": "Show.S01E01",
                "indexer": "BeyondHD",
                "customFormatScore": 120,
                "customFormats": ["HDR", {"id": 4, "name": "Atmos"}]
            }
        }))?;
        let notice = notification.grab_notice();
        assert_eq!(notice.episode_ids, vec![1, 2]);
        assert_eq!(notice.score, 120);
        assert_eq!(notice.format_names, vec!["HDR".to_string(), "Atmos".to_string()]);
        assert_eq!(notice.indexer, "BeyondHD");
        assert_eq!(notice.series_title, "Show");
        assert_eq!(notice.download_id.as_deref(), Some("abc"));
        Ok(())
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() -> Result<(), serde_json::Error> {
        let notification: Notification = serde_json::from_value(json!({"eventType": "Grab"}))?;
        let notice = notification.grab_notice();
        assert!(notice.episode_ids.is_empty());
        assert_eq!(notice.score, 0);
        assert_eq!(notice.release_title, "Unknown");
        assert_eq!(notice.indexer, "Unknown");
        assert_eq!(notification.import_score(), 0);
        Ok(())
    }
}
