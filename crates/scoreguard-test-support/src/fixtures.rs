//! Model builders and notification payloads.

use scoreguard_core::{
    CustomFormatRef, Episode, EpisodeFile, HistoryData, HistoryEventType, HistoryRecord, QueueItem,
    Series,
};
use serde_json::{Value, json};

/// Series with a quality profile.
#[must_use]
pub fn series(id: i64, title: &str, quality_profile_id: i64) -> Series {
    Series {
        id,
        title: title.to_string(),
        quality_profile_id: Some(quality_profile_id),
    }
}

/// Episode with an imported file.
#[must_use]
pub fn episode_with_file(id: i64, series_id: i64, file_id: i64) -> Episode {
    Episode {
        id,
        series_id: Some(series_id),
        season_number: 1,
        episode_number: 1,
        title: Some("Pilot".into()),
        has_file: true,
        episode_file_id: Some(file_id),
    }
}

/// Episode without a file.
#[must_use]
pub fn episode_without_file(id: i64, series_id: i64) -> Episode {
    Episode {
        id,
        series_id: Some(series_id),
        season_number: 1,
        episode_number: 1,
        title: Some("Pilot".into()),
        has_file: false,
        episode_file_id: None,
    }
}

/// Imported file with a score and named formats.
#[must_use]
pub fn episode_file(id: i64, score: i64, formats: &[&str]) -> EpisodeFile {
    EpisodeFile {
        id,
        relative_path: Some(format!("Season 01/file-{id}.mkv")),
        custom_format_score: Some(score),
        custom_formats: formats.iter().map(|name| CustomFormatRef::named(*name)).collect(),
        quality: None,
    }
}

/// `grabbed` history event.
#[must_use]
pub fn grab_event(
    episode_id: i64,
    download_id: &str,
    score: i64,
    formats: &[&str],
    indexer: &str,
) -> HistoryRecord {
    HistoryRecord {
        episode_id: Some(episode_id),
        event_type: HistoryEventType::Grabbed,
        download_id: Some(download_id.to_string()),
        source_title: Some(format!("Release.{download_id}")),
        custom_format_score: Some(score),
        custom_formats: formats.iter().map(|name| CustomFormatRef::named(*name)).collect(),
        data: HistoryData {
            indexer: Some(indexer.to_string()),
        },
        ..HistoryRecord::default()
    }
}

/// `downloadFolderImported` history event.
#[must_use]
pub fn import_event(episode_id: i64, download_id: &str, score: i64) -> HistoryRecord {
    HistoryRecord {
        episode_id: Some(episode_id),
        event_type: HistoryEventType::DownloadFolderImported,
        download_id: Some(download_id.to_string()),
        custom_format_score: Some(score),
        ..HistoryRecord::default()
    }
}

/// Queue item for an episode in the given tracked state.
#[must_use]
pub fn queue_item(id: i64, download_id: &str, episode: Episode, state: &str) -> QueueItem {
    QueueItem {
        id: Some(id),
        download_id: Some(download_id.to_string()),
        title: Some(format!("Release.{download_id}")),
        status: Some("completed".into()),
        tracked_download_status: Some("warning".into()),
        tracked_download_state: Some(state.to_string()),
        series_id: episode.series_id,
        episode_id: Some(episode.id),
        episode: Some(episode),
        ..QueueItem::default()
    }
}

/// `Grab` notification body.
#[must_use]
pub fn grab_payload(episode_ids: &[i64], download_id: &str, score: i64, formats: &[&str]) -> Value {
    json!({
        "eventType": "Grab",
        "downloadId": download_id,
        "downloadClient": "qBittorrent",
        "series": {"id": 1, "title": "Test Show"},
        "episodes": episode_ids
            .iter()
            .map(|id| json!({"id": id, "seasonNumber": 1, "episodeNumber": 1}))
            .collect::<Vec<_>>(),
        "release": {
            "releaseTitle": format!("Test.Show.{download_id}"),
            "indexer": "BeyondHD (API)",
            "customFormatScore": score,
            "customFormats": formats,
        }
    })
}

/// `Download` notification body.
#[must_use]
pub fn download_payload(episode_ids: &[i64], score: i64) -> Value {
    json!({
        "eventType": "Download",
        "series": {"id": 1, "title": "Test Show"},
        "episodes": episode_ids
            .iter()
            .map(|id| json!({"id": id, "seasonNumber": 1, "episodeNumber": 1}))
            .collect::<Vec<_>>(),
        "episodeFile": {"id": 9, "customFormatScore": score}
    })
}

/// `ManualInteractionRequired` notification body.
#[must_use]
pub fn manual_interaction_payload(download_id: &str) -> Value {
    json!({
        "eventType": "ManualInteractionRequired",
        "downloadId": download_id,
        "series": {"id": 1, "title": "Test Show"},
        "downloadStatusMessages": [{"title": "x", "messages": ["Found matching series via grab history, but release was matched to series by ID"]}]
    })
}
