//! Expiring key-value cache.
//!
//! # Design
//! - Entries carry an absolute expiry; a zero TTL stores an entry that is already expired
//!   and a TTL past the clock's range never expires.
//! - Only `get` evicts lazily; `stats` observes without mutating.
//! - Clock reads go through `tokio::time::Instant` so paused-time tests drive expiry.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

/// Default lifetime for entries stored via [`TtlCache::set_default`].
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
enum Expiry {
    Immediate,
    At(Instant),
    Never,
}

impl Expiry {
    fn after(now: Instant, ttl: Duration) -> Self {
        if ttl.is_zero() {
            return Self::Immediate;
        }
        now.checked_add(ttl).map_or(Self::Never, Self::At)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expiry: Expiry,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        match self.expiry {
            Expiry::Immediate => false,
            Expiry::At(expires_at) => now <= expires_at,
            Expiry::Never => true,
        }
    }
}

/// Entry counts reported by [`TtlCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Stored entries, expired or not.
    pub total_entries: usize,
    /// Entries that would be returned by `get`.
    pub active_entries: usize,
    /// Entries past their expiry that have not been swept yet.
    pub expired_entries: usize,
}

/// Thread-safe cache with per-entry expiry.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache with the given default TTL.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Store `value` under `key`, replacing any prior entry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expiry = Expiry::after(Instant::now(), ttl);
        let key = key.into();
        debug!(key = %key, ttl_secs = ttl.as_secs(), "cache set");
        self.lock().insert(key, CacheEntry { value, expiry });
    }

    /// Store `value` with the default TTL.
    pub fn set_default(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Fetch a live entry, evicting it when expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                debug!(key, "cache entry expired");
                None
            }
            None => None,
        }
    }

    /// Remove an entry unconditionally. Returns whether one existed.
    #[must_use]
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Sweep expired entries and return how many were removed.
    #[must_use]
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet swept.
    #[must_use]
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Entry counts without evicting anything.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.lock();
        let active_entries = entries.values().filter(|entry| entry.is_live(now)).count();
        CacheStats {
            total_entries: entries.len(),
            active_entries,
            expired_entries: entries.len() - active_entries,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
