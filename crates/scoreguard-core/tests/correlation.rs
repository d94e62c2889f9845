use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use scoreguard_core::{CorrelationSettings, Correlator, GrabNotice};
use scoreguard_events::{Event, EventBus, EventStream, ReconciliationOutcome};
use scoreguard_test_support::fixtures::{episode_without_file, import_event, queue_item};
use scoreguard_test_support::mocks::{FakeLibrary, RecordingProcessor};
use tokio_util::sync::CancellationToken;

const DELAY: Duration = Duration::from_secs(600);

struct Harness {
    library: Arc<FakeLibrary>,
    processor: Arc<RecordingProcessor>,
    correlator: Arc<Correlator>,
    events: EventBus,
}

fn harness() -> Harness {
    let library = Arc::new(FakeLibrary::new());
    let processor = Arc::new(RecordingProcessor::new());
    let events = EventBus::new();
    let correlator = Correlator::new(
        library.clone(),
        processor.clone(),
        events.clone(),
        CorrelationSettings {
            import_check_delay: DELAY,
            manual_check_delay: Duration::from_secs(5),
            threshold: 10,
        },
        CancellationToken::new(),
    );
    Harness {
        library,
        processor,
        correlator,
        events,
    }
}

fn notice(episode_ids: &[i64], download_id: &str, score: i64) -> GrabNotice {
    GrabNotice {
        episode_ids: episode_ids.to_vec(),
        download_id: Some(download_id.to_string()),
        score,
        format_names: vec!["HDR".into(), "Atmos".into()],
        release_title: format!("Show.{download_id}"),
        indexer: "BeyondHD".into(),
        series_title: "Show".into(),
        ..GrabNotice::default()
    }
}

async fn next_outcome(stream: &mut EventStream) -> Option<ReconciliationOutcome> {
    while let Some(envelope) = stream.next().await {
        if let Event::ReconciliationResolved { outcome, .. } = envelope.event {
            return Some(outcome);
        }
    }
    None
}

#[tokio::test(start_paused = true)]
async fn import_before_check_makes_reconciliation_a_no_op() -> Result<(), Box<dyn Error>> {
    let h = harness();
    let mut stream = h.events.subscribe();

    assert_eq!(h.correlator.record_grab(notice(&[100], "abc", 100)), 1);
    let cleared = h.correlator.record_import(100, 100);
    assert_eq!(cleared.map(|record| record.score), Some(100));
    assert_eq!(h.correlator.pending_count(), 0);

    let outcome = next_outcome(&mut stream).await;
    assert_eq!(outcome, Some(ReconciliationOutcome::AlreadyCleared));
    assert_eq!(h.library.queue_calls(), 0);
    assert_eq!(h.library.history_calls(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn duplicate_grab_keeps_one_record_and_supersedes_first_check() -> Result<(), Box<dyn Error>> {
    let h = harness();
    let mut stream = h.events.subscribe();

    let _ = h.correlator.record_grab(notice(&[100], "first", 50));
    tokio::time::sleep(Duration::from_secs(60)).await;
    let _ = h.correlator.record_grab(notice(&[100], "second", 80));
    assert_eq!(h.correlator.pending_count(), 1);

    let first = next_outcome(&mut stream).await;
    assert_eq!(first, Some(ReconciliationOutcome::Superseded));
    assert_eq!(h.library.queue_calls(), 0);

    let second = next_outcome(&mut stream).await;
    assert_eq!(second, Some(ReconciliationOutcome::Orphaned));
    assert_eq!(h.correlator.pending_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn resent_grab_supersedes_first_check_and_keeps_its_own_delay()
-> Result<(), Box<dyn Error>> {
    let h = harness();
    let mut stream = h.events.subscribe();

    let _ = h.correlator.record_grab(notice(&[7], "same", 10));
    tokio::time::sleep(Duration::from_secs(300)).await;
    let _ = h.correlator.record_grab(notice(&[7], "same", 10));
    assert_eq!(h.correlator.pending_count(), 1);
    assert_eq!(
        h.correlator.pending_grab(7).and_then(|record| record.download_id),
        Some("same".to_string())
    );

    let first = next_outcome(&mut stream).await;
    assert_eq!(first, Some(ReconciliationOutcome::Superseded));
    assert_eq!(h.library.queue_calls(), 0);
    assert_eq!(h.correlator.pending_count(), 1);

    let second = next_outcome(&mut stream).await;
    assert_eq!(second, Some(ReconciliationOutcome::Orphaned));
    assert_eq!(h.library.queue_calls(), 1);
    assert_eq!(h.correlator.pending_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn completed_queue_item_is_handed_to_processor() -> Result<(), Box<dyn Error>> {
    let h = harness();
    h.library.set_queue(vec![queue_item(
        5,
        "abc",
        episode_without_file(100, 1),
        "importPending",
    )]);
    let mut stream = h.events.subscribe();
    let _ = h.correlator.record_grab(notice(&[100], "abc", 100));

    let outcome = next_outcome(&mut stream).await;
    assert_eq!(outcome, Some(ReconciliationOutcome::Processed));
    let processed = h.processor.processed();
    assert_eq!(processed.len(), 1);
    assert_eq!(processed[0].id, Some(5));
    assert_eq!(h.correlator.pending_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn downloading_item_stays_pending_and_is_checked_again() -> Result<(), Box<dyn Error>> {
    let h = harness();
    let mut item = queue_item(5, "abc", episode_without_file(100, 1), "downloading");
    item.status = Some("downloading".into());
    h.library.set_queue(vec![item]);
    let mut stream = h.events.subscribe();
    let _ = h.correlator.record_grab(notice(&[100], "abc", 100));

    assert_eq!(
        next_outcome(&mut stream).await,
        Some(ReconciliationOutcome::StillQueued)
    );
    assert!(h.processor.processed().is_empty());
    assert_eq!(h.correlator.pending_count(), 1);

    h.library.set_queue(Vec::new());
    assert_eq!(
        next_outcome(&mut stream).await,
        Some(ReconciliationOutcome::Orphaned)
    );
    assert_eq!(h.library.queue_calls(), 2);
    assert_eq!(h.correlator.pending_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn silent_import_clears_record() -> Result<(), Box<dyn Error>> {
    let h = harness();
    h.library.push_history([import_event(100, "abc", 100)]);
    let mut stream = h.events.subscribe();
    let _ = h.correlator.record_grab(notice(&[100], "abc", 100));

    assert_eq!(
        next_outcome(&mut stream).await,
        Some(ReconciliationOutcome::ImportedSilently)
    );
    assert_eq!(h.correlator.pending_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn upstream_failure_keeps_record() -> Result<(), Box<dyn Error>> {
    let h = harness();
    h.library.fail_queue(true);
    let mut stream = h.events.subscribe();
    let _ = h.correlator.record_grab(notice(&[100], "abc", 100));

    assert_eq!(
        next_outcome(&mut stream).await,
        Some(ReconciliationOutcome::Failed)
    );
    assert_eq!(h.correlator.pending_count(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn worse_import_emits_score_mismatch() -> Result<(), Box<dyn Error>> {
    let h = harness();
    let mut stream = h.events.subscribe();
    let _ = h.correlator.record_grab(notice(&[100], "abc", 100));
    let _ = h.correlator.record_import(100, 50);

    let mut saw_mismatch = false;
    while let Some(envelope) = stream.next().await {
        match envelope.event {
            Event::ScoreMismatch {
                grab_score,
                import_score,
                ..
            } => {
                assert_eq!((grab_score, import_score), (100, 50));
                saw_mismatch = true;
            }
            Event::ImportConfirmed { .. } => break,
            _ => {}
        }
    }
    assert!(saw_mismatch);
    assert_eq!(h.correlator.pending_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn manual_interaction_triggers_download_check() {
    let h = harness();
    h.correlator.request_download_check("dl-9");
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(h.processor.download_checks(), vec!["dl-9".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_drops_pending_grabs_and_checks() {
    let h = harness();
    let _ = h.correlator.record_grab(notice(&[1, 2], "abc", 10));
    assert_eq!(h.correlator.pending_count(), 2);
    h.correlator.shutdown();
    assert_eq!(h.correlator.pending_count(), 0);
    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(h.library.queue_calls(), 0);
}
