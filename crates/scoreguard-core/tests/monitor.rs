use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use scoreguard_core::{
    CacheSettings, CachedLibrary, CustomFormatRef, DecisionAction, DecisionEngine, FormatItem,
    MediaLibrary, MonitorSettings, ProcessOutcome, QualityProfile, QueueMonitor, RemoveOptions,
    ScoreAnalyzer, TrackerClassifier,
};
use scoreguard_events::EventBus;
use scoreguard_test_support::fixtures::{
    episode_file, episode_with_file, episode_without_file, grab_event, import_event, queue_item,
    series,
};
use scoreguard_test_support::mocks::FakeLibrary;

fn engine() -> DecisionEngine {
    DecisionEngine::new(10, TrackerClassifier::new(["beyondhd"], ["nyaa"]))
}

fn monitor(library: &Arc<FakeLibrary>, dry_run: bool) -> QueueMonitor {
    let shared: Arc<dyn MediaLibrary> = library.clone();
    QueueMonitor::new(
        Arc::clone(&shared),
        ScoreAnalyzer::new(shared, engine()),
        EventBus::new(),
        MonitorSettings {
            dry_run,
            settle_delay: Duration::from_secs(8),
            webhook_without_secret: false,
        },
    )
}

fn seeded(grab_score: i64, current_score: i64, indexer: &str) -> Arc<FakeLibrary> {
    let library = Arc::new(FakeLibrary::new());
    library.add_series(series(1, "Test Show", 3));
    library.add_episode(episode_with_file(100, 1, 900));
    library.add_file(episode_file(900, current_score, &["x265"]));
    library.push_history([grab_event(100, "abc", grab_score, &["HDR", "Atmos"], indexer)]);
    library.set_queue(vec![queue_item(
        5,
        "abc",
        episode_with_file(100, 1, 900),
        "importPending",
    )]);
    library
}

#[tokio::test(start_paused = true)]
async fn higher_grab_score_forces_import_and_cleans_queue() -> Result<(), Box<dyn Error>> {
    let library = seeded(100, 80, "SomeIndexer");
    let monitor = monitor(&library, false);

    let summary = monitor.process_stuck_imports().await?;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.forced, 1);

    let forced = library.forced_imports();
    assert_eq!(forced.len(), 1);
    assert_eq!(forced[0].download_id, "abc");
    assert_eq!(forced[0].episode_id, 100);
    assert_eq!(library.removals(), vec![(5, RemoveOptions::queue_only())]);

    let stats = monitor.stats();
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.forced_imports, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn lower_public_score_removes_from_client() -> Result<(), Box<dyn Error>> {
    let library = seeded(40, 100, "Nyaa");
    let monitor = monitor(&library, false);

    let summary = monitor.process_stuck_imports().await?;
    assert_eq!(summary.removed, 1);
    assert_eq!(library.removals(), vec![(5, RemoveOptions::from_client())]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn lower_private_score_keeps_download_seeding() -> Result<(), Box<dyn Error>> {
    let library = seeded(60, 100, "BeyondHD (API)");
    let monitor = monitor(&library, false);

    let queue = library.queue().await?;
    let outcome = monitor.process_item(&queue[0]).await;
    assert_eq!(outcome, ProcessOutcome::Kept);
    assert_eq!(library.removals(), vec![(5, RemoveOptions::queue_only())]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn dry_run_executes_nothing() -> Result<(), Box<dyn Error>> {
    let library = seeded(100, 80, "SomeIndexer");
    let monitor = monitor(&library, true);

    let summary = monitor.process_stuck_imports().await?;
    assert_eq!(summary.forced, 1);
    assert!(library.forced_imports().is_empty());
    assert!(library.removals().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn episode_without_file_is_monitored() -> Result<(), Box<dyn Error>> {
    let library = seeded(100, 80, "SomeIndexer");
    library.add_episode(episode_without_file(100, 1));
    let monitor = monitor(&library, false);

    let queue = library.queue().await?;
    assert_eq!(monitor.process_item(&queue[0]).await, ProcessOutcome::Monitored);
    assert!(library.forced_imports().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn zero_recorded_score_falls_back_to_profile_weights() -> Result<(), Box<dyn Error>> {
    let library = Arc::new(FakeLibrary::new());
    library.add_series(series(1, "Test Show", 3));
    library.add_profile(QualityProfile {
        id: 3,
        name: "HD".into(),
        format_items: vec![
            FormatItem {
                format: 11,
                name: Some("HDR".into()),
                score: 40,
            },
            FormatItem {
                format: 12,
                name: Some("Atmos".into()),
                score: 25,
            },
        ],
    });
    library.add_episode(episode_with_file(100, 1, 900));
    library.add_file(episode_file(900, 50, &[]));
    let mut grab = grab_event(100, "abc", 0, &[], "nyaa");
    grab.custom_formats = vec![
        CustomFormatRef::with_id(11, "HDR"),
        CustomFormatRef::with_id(12, "Atmos"),
    ];
    library.push_history([grab]);

    let shared: Arc<dyn MediaLibrary> = library.clone();
    let cached: Arc<dyn MediaLibrary> =
        Arc::new(CachedLibrary::new(shared, CacheSettings::default()));
    let analyzer = ScoreAnalyzer::new(cached, engine());
    let item = queue_item(5, "abc", episode_with_file(100, 1, 900), "importPending");

    let decision = analyzer.analyze(&item).await?;
    assert_eq!(decision.grab_score, Some(65));
    assert_eq!(decision.current_score, Some(50));
    assert_eq!(decision.action, DecisionAction::ForceImport);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn repeated_grabs_are_counted_per_episode() -> Result<(), Box<dyn Error>> {
    let library = Arc::new(FakeLibrary::new());
    library.push_history([
        grab_event(100, "c", 10, &[], "nyaa"),
        grab_event(100, "b", 10, &[], "nyaa"),
        import_event(100, "a", 10),
        grab_event(100, "a", 10, &[], "nyaa"),
        grab_event(200, "z", 10, &[], "nyaa"),
    ]);
    let monitor = monitor(&library, false);

    assert_eq!(monitor.check_repeated_grabs().await?, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn inspect_reports_queue_decision_or_history() -> Result<(), Box<dyn Error>> {
    let library = seeded(100, 80, "SomeIndexer");
    let monitor = monitor(&library, false);

    let queued = monitor.inspect_episode("test show", 1, 1).await?;
    assert_eq!(queued.current_score, Some(80));
    assert_eq!(
        queued.queue_decision.map(|decision| decision.action),
        Some(DecisionAction::ForceImport)
    );

    library.set_queue(Vec::new());
    let idle = monitor.inspect_episode("test show", 1, 1).await?;
    assert!(idle.queue_decision.is_none());
    assert_eq!(idle.history.map(|summary| summary.recent_grabs.len()), Some(1));

    assert!(monitor.inspect_episode("missing", 1, 1).await.is_err());
    Ok(())
}

#[tokio::test]
async fn connection_report_counts_upstream_configuration() -> Result<(), Box<dyn Error>> {
    let library = seeded(0, 0, "");
    let monitor = monitor(&library, false);
    let report = monitor.test_connection().await?;
    assert_eq!(report.version.as_deref(), Some("4.0.0"));
    assert_eq!(report.series_mapped, 1);
    Ok(())
}
