use std::error::Error;
use std::time::Duration;

use httpmock::prelude::*;
use scoreguard_core::{MediaLibrary, RemoveOptions, RetryPolicy};
use scoreguard_sonarr::{RetryBudgets, SonarrClient, SonarrSettings};
use serde_json::json;

const API_KEY: &str = "0123456789abcdef0123456789abcdef";

fn client_for(server: &MockServer) -> Result<SonarrClient, Box<dyn Error>> {
    let settings = SonarrSettings {
        url: server.base_url(),
        api_key: API_KEY.to_string(),
        timeout: Duration::from_secs(5),
    };
    Ok(SonarrClient::new(&settings)?.with_budgets(RetryBudgets::single(Duration::from_secs(5))))
}

#[tokio::test]
async fn queue_requests_embedded_resources_with_api_key() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v3/queue")
            .header("x-api-key", API_KEY)
            .query_param("pageSize", "1000")
            .query_param("includeEpisode", "true")
            .query_param("includeSeries", "true");
        then.status(200).json_body(json!({
            "page": 1,
            "records": [{
                "id": 7,
                "downloadId": "ABC",
                "status": "completed",
                "trackedDownloadState": "importPending",
                "episode": {"id": 100, "seasonNumber": 1, "episodeNumber": 2},
                "series": {"id": 5, "title": "Show"}
            }]
        }));
    });

    let queue = client_for(&server)?.queue().await?;

    mock.assert();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].download_id.as_deref(), Some("ABC"));
    assert_eq!(queue[0].episode_id(), Some(100));
    assert_eq!(queue[0].series_title(), "Show");
    Ok(())
}

#[tokio::test]
async fn definitions_are_memoized_until_cleared() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/v3/customformat");
        then.status(200)
            .json_body(json!([{"id": 1, "name": "HDR"}, {"id": 2, "name": "Atmos"}]));
    });
    let client = client_for(&server)?;

    assert_eq!(client.custom_formats().await?.len(), 2);
    assert_eq!(client.custom_formats().await?.len(), 2);
    mock.assert_calls(1);

    client.clear_cache().await;
    let _ = client.custom_formats().await?;
    mock.assert_calls(2);
    Ok(())
}

#[tokio::test]
async fn format_scores_follow_the_series_profile() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start_async().await;
    let _series = server.mock(|when, then| {
        when.method(GET).path("/api/v3/series");
        then.status(200).json_body(json!([
            {"id": 5, "title": "Show", "qualityProfileId": 3},
            {"id": 6, "title": "Other"}
        ]));
    });
    let _profiles = server.mock(|when, then| {
        when.method(GET).path("/api/v3/qualityprofile");
        then.status(200).json_body(json!([{
            "id": 3,
            "name": "HD",
            "formatItems": [
                {"format": 1, "name": "HDR", "score": 40},
                {"format": 2, "name": "Atmos", "score": 25}
            ]
        }]));
    });
    let client = client_for(&server)?;

    let scores = client.custom_format_scores(5).await?;
    assert_eq!(scores.get(&1), Some(&40));
    assert_eq!(scores.get(&2), Some(&25));
    assert!(client.custom_format_scores(6).await?.is_empty());

    let series = client.series_by_title("sHo").await?;
    assert_eq!(series.map(|series| series.id), Some(5));
    Ok(())
}

#[tokio::test]
async fn missing_episode_file_is_none() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start_async().await;
    let _missing = server.mock(|when, then| {
        when.method(GET).path("/api/v3/episodefile/9");
        then.status(404).json_body(json!({"message": "NotFound"}));
    });
    let _present = server.mock(|when, then| {
        when.method(GET).path("/api/v3/episodefile/10");
        then.status(200).json_body(json!({
            "id": 10,
            "customFormatScore": 55,
            "customFormats": [{"id": 1, "name": "HDR"}]
        }));
    });
    let client = client_for(&server)?;

    assert!(client.episode_file(9).await?.is_none());
    let file = client.episode_file(10).await?.ok_or("file expected")?;
    assert_eq!(file.custom_format_score, Some(55));
    assert_eq!(file.custom_formats[0].name, "HDR");
    Ok(())
}

#[tokio::test]
async fn force_import_assigns_episode_to_candidates() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start_async().await;
    let candidates = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v3/manualimport")
            .query_param("downloadId", "ABC");
        then.status(200)
            .json_body(json!([{"path": "/downloads/show.mkv", "episodeIds": []}]));
    });
    let submit = server.mock(|when, then| {
        when.method(PUT).path("/api/v3/manualimport").json_body(json!([{
            "path": "/downloads/show.mkv",
            "episodeIds": [100],
            "quality": {"quality": {"id": 7}}
        }]));
        then.status(202);
    });
    let client = client_for(&server)?;

    let imported = client
        .force_import("ABC", 100, Some(json!({"quality": {"id": 7}})))
        .await?;

    assert!(imported);
    candidates.assert();
    submit.assert();
    Ok(())
}

#[tokio::test]
async fn force_import_without_candidates_reports_false() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start_async().await;
    let _candidates = server.mock(|when, then| {
        when.method(GET).path("/api/v3/manualimport");
        then.status(200).json_body(json!([]));
    });
    let submit = server.mock(|when, then| {
        when.method(PUT).path("/api/v3/manualimport");
        then.status(202);
    });

    assert!(!client_for(&server)?.force_import("ABC", 100, None).await?);
    submit.assert_calls(0);
    Ok(())
}

#[tokio::test]
async fn remove_from_queue_sends_flags() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(DELETE)
            .path("/api/v3/queue/7")
            .query_param("removeFromClient", "false")
            .query_param("blocklist", "false");
        then.status(200);
    });

    client_for(&server)?
        .remove_from_queue(7, RemoveOptions::queue_only())
        .await?;
    mock.assert();
    Ok(())
}

#[tokio::test]
async fn server_errors_are_retried_but_client_errors_are_not() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start_async().await;
    let failing = server.mock(|when, then| {
        when.method(GET).path("/api/v3/system/status");
        then.status(503).json_body(json!({"message": "starting up"}));
    });
    let unauthorized = server.mock(|when, then| {
        when.method(GET).path("/api/v3/episode/1");
        then.status(401);
    });
    let retrying = RetryPolicy::new(3, Duration::ZERO).with_attempt_timeout(Duration::from_secs(5));
    let client = client_for(&server)?.with_budgets(RetryBudgets {
        status: retrying,
        lookups: retrying,
        ..RetryBudgets::single(Duration::from_secs(5))
    });

    let err = client.system_status().await.expect_err("status should fail");
    failing.assert_calls(3);
    assert!(format!("{err:#}").contains("503"));

    assert!(client.episode(1).await.is_err());
    unauthorized.assert_calls(1);
    Ok(())
}
