//! Delayed reconciliation scheduling.
//!
//! # Design
//! - One driver task owns a [`DelayQueue`]; callers only send `(check, delay)` pairs.
//! - Due checks are spawned as independent tasks, so a slow or failing check never
//!   delays or affects another.
//! - Scheduled checks are never cancelled individually; handlers re-validate state when
//!   they fire. Shutdown drops everything still pending.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;
use tracing::{debug, warn};

/// Work item fired after its delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledCheck {
    /// Re-check a cached grab for an episode.
    Episode {
        /// Episode whose grab is pending.
        episode_id: i64,
        /// Download the check was scheduled for.
        download_id: Option<String>,
        /// Grab-table generation the check belongs to.
        generation: u64,
    },
    /// Look for a download in the queue and process it.
    Download {
        /// Download correlation token.
        download_id: String,
    },
}

/// Executes due checks.
#[async_trait]
pub trait CheckHandler: Send + Sync + 'static {
    /// Run one check. Implementations absorb their own failures.
    async fn run_check(&self, check: ScheduledCheck);
}

/// Handle used to schedule checks on the driver task.
#[derive(Debug, Clone)]
pub struct ReconciliationScheduler {
    sender: mpsc::UnboundedSender<(ScheduledCheck, Duration)>,
    token: CancellationToken,
    pending: Arc<AtomicUsize>,
}

impl ReconciliationScheduler {
    /// Spawn the driver task. The driver stops when `handler` is dropped or on shutdown.
    #[must_use]
    pub fn spawn<H: CheckHandler>(handler: Weak<H>, token: CancellationToken) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        tokio::spawn(drive(handler, receiver, token.clone(), Arc::clone(&pending)));
        Self {
            sender,
            token,
            pending,
        }
    }

    /// Fire `check` once after `delay`.
    pub fn schedule(&self, check: ScheduledCheck, delay: Duration) {
        if self.token.is_cancelled() {
            debug!(?check, "scheduler stopped; check dropped");
            return;
        }
        if self.sender.send((check, delay)).is_err() {
            warn!("reconciliation driver is gone; check dropped");
        }
    }

    /// Checks accepted by the driver and not yet fired.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Stop the driver and drop every pending check.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether [`Self::shutdown`] has been requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }
}

async fn drive<H: CheckHandler>(
    handler: Weak<H>,
    mut receiver: mpsc::UnboundedReceiver<(ScheduledCheck, Duration)>,
    token: CancellationToken,
    pending: Arc<AtomicUsize>,
) {
    let mut queue: DelayQueue<ScheduledCheck> = DelayQueue::new();
    loop {
        tokio::select! {
            () = token.cancelled() => break,
            received = receiver.recv() => {
                let Some((check, delay)) = received else { break };
                let _ = queue.insert(check, delay);
                pending.store(queue.len(), Ordering::Relaxed);
            }
            Some(expired) = queue.next(), if !queue.is_empty() => {
                pending.store(queue.len(), Ordering::Relaxed);
                let Some(handler) = handler.upgrade() else { break };
                let check = expired.into_inner();
                tokio::spawn(async move {
                    handler.run_check(check).await;
                });
            }
        }
    }
    if !queue.is_empty() {
        debug!(dropped = queue.len(), "reconciliation driver stopped with pending checks");
    }
    pending.store(0, Ordering::Relaxed);
}
