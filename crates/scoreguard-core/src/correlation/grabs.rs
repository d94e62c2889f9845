//! In-memory table of grabs awaiting import confirmation.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::model::GrabRecord;

/// Pending grabs keyed by episode; the latest grab for an episode replaces earlier ones.
///
/// Every insert is stamped with a table-wide generation. Scheduled work carries the
/// generation it was created for and only acts while that generation is still current,
/// so a re-sent grab with the same download id still supersedes the earlier check.
#[derive(Debug, Default)]
pub struct GrabTable {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_generation: u64,
    records: HashMap<i64, Stamped>,
}

#[derive(Debug)]
struct Stamped {
    generation: u64,
    record: GrabRecord,
}

impl GrabTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record, returning its generation and the record it replaced.
    #[must_use]
    pub fn insert(&self, record: GrabRecord) -> (u64, Option<GrabRecord>) {
        let mut inner = self.lock();
        inner.next_generation = inner.next_generation.wrapping_add(1);
        let generation = inner.next_generation;
        let previous = inner
            .records
            .insert(record.episode_id, Stamped { generation, record })
            .map(|stamped| stamped.record);
        (generation, previous)
    }

    /// Copy of the record for an episode.
    #[must_use]
    pub fn get(&self, episode_id: i64) -> Option<GrabRecord> {
        self.lock()
            .records
            .get(&episode_id)
            .map(|stamped| stamped.record.clone())
    }

    /// Copy of the record for an episode along with its generation.
    #[must_use]
    pub fn get_stamped(&self, episode_id: i64) -> Option<(u64, GrabRecord)> {
        self.lock()
            .records
            .get(&episode_id)
            .map(|stamped| (stamped.generation, stamped.record.clone()))
    }

    /// Remove the record for an episode.
    #[must_use]
    pub fn remove(&self, episode_id: i64) -> Option<GrabRecord> {
        self.lock()
            .records
            .remove(&episode_id)
            .map(|stamped| stamped.record)
    }

    /// Remove the record only if it is still the one stored as `generation`.
    ///
    /// Returns whether a record was removed; a newer grab for the episode is left alone.
    #[must_use]
    pub fn remove_if(&self, episode_id: i64, generation: u64) -> bool {
        let mut inner = self.lock();
        let current = inner
            .records
            .get(&episode_id)
            .is_some_and(|stamped| stamped.generation == generation);
        if current {
            inner.records.remove(&episode_id);
        }
        current
    }

    /// Number of pending grabs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether no grabs are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Drop every pending grab.
    pub fn clear(&self) {
        self.lock().records.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(episode_id: i64, download_id: &str, score: i64) -> GrabRecord {
        GrabRecord {
            episode_id,
            download_id: Some(download_id.to_string()),
            score,
            format_names: Vec::new(),
            release_title: "Show.S01E01".into(),
            indexer: "nyaa".into(),
            download_client: None,
            series_title: "Show".into(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn last_grab_wins() {
        let table = GrabTable::new();
        let (first, replaced) = table.insert(record(100, "a", 10));
        assert!(replaced.is_none());
        let (second, replaced) = table.insert(record(100, "b", 20));
        assert_eq!(replaced.map(|r| r.score), Some(10));
        assert!(second > first);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(100).and_then(|r| r.download_id), Some("b".into()));
    }

    #[test]
    fn conditional_removal_respects_newer_grabs() {
        let table = GrabTable::new();
        let (old, _) = table.insert(record(7, "same", 0));
        let (new, _) = table.insert(record(7, "same", 0));
        assert!(!table.remove_if(7, old));
        assert!(!table.is_empty());
        assert_eq!(table.get_stamped(7).map(|(generation, _)| generation), Some(new));
        assert!(table.remove_if(7, new));
        assert!(table.is_empty());
        assert!(!table.remove_if(7, new));
    }
}
