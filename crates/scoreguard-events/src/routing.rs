//! Event bus routing helpers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::broadcast::{self, Receiver, Sender, error::RecvError};

use crate::payloads::{DEFAULT_CHANNEL_CAPACITY, Event, EventEnvelope, EventId};

/// Cloneable handle to one broadcast channel of domain events.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    /// Bus whose subscribers may fall `capacity` events behind before skipping (minimum one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Bus with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            skipped: 0,
        }
    }

    /// Stamp and broadcast `event`. Publishing with no subscribers is not an error.
    #[must_use]
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = self.sender.send(EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        });
        id
    }

    /// Live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscription to the bus.
pub struct EventStream {
    receiver: Receiver<EventEnvelope>,
    skipped: u64,
}

impl EventStream {
    /// Receive the next event. Lagged gaps are skipped; `None` means the bus is gone.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(RecvError::Lagged(missed)) => self.skipped += missed,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Events dropped because this subscriber fell behind.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }
}
