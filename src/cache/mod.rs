//! Latest-value cache
//!
//! Holds exactly one entry per subject: the most recent sample written by
//! the ingestion pipeline. `set` always overwrites, `set_if_newer` only
//! moves an entry forward in time, and `get` never returns an expired entry.
//! A miss tells the caller to fall back to the record store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::types::{CacheEntry, SubjectKey, TelemetrySample};
use crate::utils::{Clock, SystemClock};

/// Key/value cache of the latest sample per subject
pub trait LatestCache: Send + Sync {
    /// Latest sample for `key`, or `None` if absent or expired
    fn get(&self, key: SubjectKey) -> Option<TelemetrySample>;

    /// Overwrite the entry for `key`; `ttl = None` means no expiry
    fn set(&self, key: SubjectKey, sample: TelemetrySample, ttl: Option<Duration>);

    /// Store `sample` unless a live entry with a later timestamp is present
    ///
    /// The check and the write are one atomic step. Returns whether the
    /// entry was written.
    fn set_if_newer(&self, key: SubjectKey, sample: TelemetrySample, ttl: Option<Duration>) -> bool;
}

/// In-process cache backed by a map guarded by an RwLock
pub struct InMemoryLatestCache {
    entries: RwLock<HashMap<SubjectKey, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryLatestCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Full entry for `key`, including its expiry, if still live
    pub fn entry(&self, key: SubjectKey) -> Option<CacheEntry> {
        let now = self.clock.now();
        self.entries
            .read()
            .get(&key)
            .filter(|e| !e.is_expired(now))
            .cloned()
    }

    /// Number of stored entries, expired ones included until evicted
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn make_entry(&self, key: SubjectKey, sample: TelemetrySample, ttl: Option<Duration>) -> CacheEntry {
        // Out-of-range TTLs are treated as "never expires"
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| self.clock.now().checked_add_signed(ttl));

        CacheEntry {
            key,
            sample,
            expires_at,
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }
}

impl Default for InMemoryLatestCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestCache for InMemoryLatestCache {
    fn get(&self, key: SubjectKey) -> Option<TelemetrySample> {
        self.entry(key).map(|e| e.sample)
    }

    fn set(&self, key: SubjectKey, sample: TelemetrySample, ttl: Option<Duration>) {
        let entry = self.make_entry(key, sample, ttl);
        self.entries.write().insert(key, entry);
    }

    fn set_if_newer(&self, key: SubjectKey, sample: TelemetrySample, ttl: Option<Duration>) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        let newer_cached = entries
            .get(&key)
            .filter(|e| !e.is_expired(now))
            .is_some_and(|e| e.sample.timestamp > sample.timestamp);
        if newer_cached {
            return false;
        }

        let entry = self.make_entry(key, sample, ttl);
        entries.insert(key, entry);
        true
    }
}
