use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use scoreguard_app::{Orchestrator, RunOptions};
use scoreguard_config::AppConfig;
use scoreguard_core::{GrabNotice, RemoveOptions};
use scoreguard_telemetry::Metrics;
use scoreguard_test_support::fixtures::{
    episode_file, episode_with_file, grab_event, queue_item, series,
};
use scoreguard_test_support::mocks::FakeLibrary;

fn stuck_library(grab_score: i64, current_score: i64) -> Arc<FakeLibrary> {
    let library = Arc::new(FakeLibrary::new());
    library.add_series(series(1, "Test Show", 3));
    library.add_episode(episode_with_file(100, 1, 900));
    library.add_file(episode_file(900, current_score, &["x265"]));
    library.push_history([grab_event(100, "abc", grab_score, &["HDR"], "SomeIndexer")]);
    library.set_queue(vec![queue_item(
        5,
        "abc",
        episode_with_file(100, 1, 900),
        "importPending",
    )]);
    library
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.decisions.force_import_threshold = 10;
    config.monitoring.interval = 60;
    config.monitoring.post_import_settle = 1;
    config
}

#[tokio::test(start_paused = true)]
async fn single_run_forces_better_grab() -> Result<(), Box<dyn Error>> {
    let library = stuck_library(100, 80);
    let metrics = Metrics::new()?;
    let orchestrator = Orchestrator::new(
        config(),
        library.clone(),
        RunOptions::default(),
        metrics.clone(),
    );

    let summary = orchestrator.run_once().await?;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.forced, 1);
    assert_eq!(library.forced_imports().len(), 1);
    assert_eq!(library.removals(), vec![(5, RemoveOptions::queue_only())]);
    assert_eq!(metrics.snapshot().monitor_cycles_total, 1);

    orchestrator.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn dry_run_leaves_upstream_untouched() -> Result<(), Box<dyn Error>> {
    let library = stuck_library(100, 80);
    let orchestrator = Orchestrator::new(
        config(),
        library.clone(),
        RunOptions {
            dry_run: true,
            webhook: false,
        },
        Metrics::new()?,
    );

    let summary = orchestrator.run_once().await?;
    assert_eq!(summary.forced, 1);
    assert!(library.forced_imports().is_empty());
    assert!(library.removals().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_scan_is_reported_by_single_run() -> Result<(), Box<dyn Error>> {
    let library = Arc::new(FakeLibrary::new());
    library.fail_queue(true);
    let metrics = Metrics::new()?;
    let orchestrator =
        Orchestrator::new(config(), library, RunOptions::default(), metrics.clone());

    assert!(orchestrator.run_once().await.is_err());
    assert_eq!(metrics.snapshot().monitor_cycles_total, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn continuous_loop_survives_failures_until_cancelled() -> Result<(), Box<dyn Error>> {
    let library = Arc::new(FakeLibrary::new());
    library.fail_queue(true);
    let metrics = Metrics::new()?;
    let orchestrator = Orchestrator::new(
        config(),
        library.clone(),
        RunOptions::default(),
        metrics.clone(),
    );

    let token = orchestrator.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(150)).await;
        token.cancel();
    });
    orchestrator.run_continuous().await;

    assert_eq!(metrics.snapshot().monitor_cycles_total, 3);
    assert!(library.queue_calls() >= 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn forwarder_feeds_decisions_into_metrics() -> Result<(), Box<dyn Error>> {
    let library = stuck_library(100, 80);
    let metrics = Metrics::new()?;
    let orchestrator = Orchestrator::new(
        config(),
        library,
        RunOptions::default(),
        metrics.clone(),
    );
    let forwarder = orchestrator.spawn_metrics_forwarder();

    let _ = orchestrator.run_once().await?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    orchestrator.shutdown().await;
    forwarder.await?;

    let rendered = metrics.render()?;
    assert!(rendered.contains("decisions_total"));
    assert!(rendered.contains("force_import"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shutdown_drops_pending_grabs() -> Result<(), Box<dyn Error>> {
    let library = Arc::new(FakeLibrary::new());
    let orchestrator =
        Orchestrator::new(config(), library, RunOptions::default(), Metrics::new()?);
    let correlator = orchestrator.correlator();

    let cached = correlator.record_grab(GrabNotice {
        episode_ids: vec![100, 101],
        download_id: Some("abc".into()),
        score: 120,
        ..GrabNotice::default()
    });
    assert_eq!(cached, 2);
    assert_eq!(correlator.pending_count(), 2);

    orchestrator.shutdown().await;
    assert_eq!(correlator.pending_count(), 0);
    assert!(orchestrator.shutdown_token().is_cancelled());
    Ok(())
}

#[tokio::test]
async fn test_config_reports_series_mapping() -> Result<(), Box<dyn Error>> {
    let library = stuck_library(0, 0);
    let orchestrator =
        Orchestrator::new(config(), library, RunOptions::default(), Metrics::new()?);

    let report = orchestrator.test_config().await?;
    assert_eq!(report.series_mapped, 1);
    orchestrator.shutdown().await;
    Ok(())
}
