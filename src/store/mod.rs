// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Local Cache Store
//!
//! Process-local key/value cache with per-entry TTL, pattern invalidation,
//! and hit/miss accounting. It has no knowledge of what it stores and issues
//! no network calls.
//!
//! # Flow
//!
//! ```text
//! get(key)
//!   │
//!   ├─→ missing          → miss
//!   ├─→ expired          → delete entry, miss (lazy expiry)
//!   └─→ fresh            → hit, return value
//!
//! set(key, value, ttl)
//!   │
//!   ├─→ empty collection → refused (poisoning guard)
//!   └─→ otherwise        → entry with expires_at = now + ttl
//! ```
//!
//! Expired entries are also removed proactively by a periodic [`sweep`]
//! driven from the engine, so memory stays bounded even for keys that are
//! never read again.
//!
//! [`sweep`]: LocalCacheStore::sweep

mod entry;

pub use entry::CacheEntry;
pub(crate) use entry::now_millis;

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::capability::CacheError;
use crate::metrics;
use crate::resource::CachedValue;

/// Point-in-time cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_keys: usize,
    /// Monotonic for the process lifetime; survives [`LocalCacheStore::clear`].
    pub hit_count: u64,
    pub miss_count: u64,
    /// `hits / (hits + misses)`, 0.0 when no reads yet
    pub hit_rate: f64,
    /// Best-effort: sum of key length + serialized value length
    pub estimated_bytes: usize,
    pub oldest_key: Option<String>,
    pub newest_key: Option<String>,
}

/// Process-local TTL cache shared by every consumer of the engine.
pub struct LocalCacheStore {
    entries: DashMap<String, CacheEntry>,
    default_ttl_ms: i64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LocalCacheStore {
    #[must_use]
    pub fn new(default_ttl_ms: u64) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl_ms: default_ttl_ms as i64,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Store a value with the given TTL (`None` uses the default).
    ///
    /// Returns `Ok(false)` without storing when the value is an empty
    /// collection: a transient empty response cached for the full TTL window
    /// would poison every consumer until expiry.
    ///
    /// # Errors
    ///
    /// [`CacheError::EmptyKey`] on an empty key (contract violation).
    pub fn set(
        &self,
        key: &str,
        value: CachedValue,
        ttl_ms: Option<u64>,
    ) -> Result<bool, CacheError> {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }
        if value.is_empty_collection() {
            warn!(key = %key, "refusing to cache empty collection");
            metrics::record_cache_write_refused();
            return Ok(false);
        }

        let ttl = ttl_ms.map(|t| t as i64).unwrap_or(self.default_ttl_ms);
        let entry = CacheEntry::new(key.to_string(), value, ttl, now_millis());
        debug!(key = %key, ttl_ms = ttl, "cache set");
        self.entries.insert(key.to_string(), entry);
        metrics::set_cache_entries(self.entries.len());
        Ok(true)
    }

    /// Get a value, treating an expired entry as absent.
    ///
    /// A lazily-expired entry is deleted on read.
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let now = now_millis();
        let expired = match self.entries.get(key) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_access(false);
                return None;
            }
            Some(entry) => {
                if !entry.is_expired(now) {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    metrics::record_cache_access(true);
                    return Some(entry.value.clone());
                }
                true
            }
        };
        // Read guard dropped above; safe to remove now.
        if expired {
            self.entries.remove(key);
            metrics::record_cache_eviction("expired", 1);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_access(false);
        None
    }

    /// Same expiry semantics as [`get`](Self::get) without returning data
    /// and without touching the hit/miss counters.
    pub fn has(&self, key: &str) -> bool {
        let now = now_millis();
        match self.entries.get(key) {
            Some(entry) => !entry.is_expired(now),
            None => false,
        }
    }

    /// Read an entry regardless of expiry, with no expiry bookkeeping.
    ///
    /// Degraded paths use this: within a rate-limit window or after a failed
    /// remote fetch, a stale value beats no value. The entry is left in
    /// place so it stays available until a successful fetch replaces it.
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.clone())
    }

    /// Delete every entry whose key contains `substring`; returns the number
    /// deleted. Used to clear a whole resource class stored under multiple
    /// parameterized keys (e.g. `listings:search:cat=3:page=2`).
    ///
    /// The count is taken inside the retain pass, not from length snapshots:
    /// concurrent inserts may land while the pass runs and must not skew it.
    pub fn invalidate_pattern(&self, substring: &str) -> usize {
        let removed = AtomicUsize::new(0);
        self.entries.retain(|key, _| {
            if key.contains(substring) {
                removed.fetch_add(1, Ordering::Relaxed);
                false
            } else {
                true
            }
        });
        let removed = removed.into_inner();
        if removed > 0 {
            debug!(pattern = %substring, removed, "pattern invalidation");
            metrics::record_cache_eviction("pattern", removed);
            metrics::set_cache_entries(self.entries.len());
        }
        removed
    }

    /// Remove every expired entry now; returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = now_millis();
        let removed = AtomicUsize::new(0);
        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                removed.fetch_add(1, Ordering::Relaxed);
                false
            } else {
                true
            }
        });
        let removed = removed.into_inner();
        if removed > 0 {
            debug!(removed, "sweep removed expired entries");
            metrics::record_cache_eviction("sweep", removed);
            metrics::set_cache_entries(self.entries.len());
        }
        removed
    }

    /// Empty the store. Hit/miss counters are NOT reset.
    pub fn clear(&self) {
        let removed = self.entries.len();
        self.entries.clear();
        metrics::record_cache_eviction("clear", removed);
        metrics::set_cache_entries(0);
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        let mut estimated_bytes = 0usize;
        let mut oldest: Option<(i64, String)> = None;
        let mut newest: Option<(i64, String)> = None;
        for entry in self.entries.iter() {
            estimated_bytes += entry.estimated_bytes();
            if oldest.as_ref().map_or(true, |(t, _)| entry.inserted_at < *t) {
                oldest = Some((entry.inserted_at, entry.key.clone()));
            }
            if newest.as_ref().map_or(true, |(t, _)| entry.inserted_at > *t) {
                newest = Some((entry.inserted_at, entry.key.clone()));
            }
        }
        metrics::set_cache_bytes(estimated_bytes);

        CacheStats {
            total_keys: self.entries.len(),
            hit_count: hits,
            miss_count: misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            estimated_bytes,
            oldest_key: oldest.map(|(_, k)| k),
            newest_key: newest.map(|(_, k)| k),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn store() -> LocalCacheStore {
        LocalCacheStore::new(600_000)
    }

    fn value(n: u64) -> CachedValue {
        CachedValue::Json(json!({"n": n}))
    }

    #[test]
    fn test_set_then_get() {
        let store = store();
        store.set("k1", value(1), None).unwrap();
        assert_eq!(store.get("k1"), Some(value(1)));
        assert!(store.has("k1"));
    }

    #[test]
    fn test_get_missing_is_none() {
        let store = store();
        assert_eq!(store.get("nope"), None);
        assert!(!store.has("nope"));
    }

    #[test]
    fn test_expired_entry_is_absent_and_deleted_on_read() {
        let store = store();
        store.set("k1", value(1), Some(0)).unwrap();
        assert_eq!(store.get("k1"), None);
        // Lazy expiry removed the entry entirely.
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_ttl_boundary() {
        let store = store();
        store.set("k1", value(1), Some(30)).unwrap();
        assert_eq!(store.get("k1"), Some(value(1)));
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(store.get("k1"), None);
    }

    #[test]
    fn test_peek_survives_expiry() {
        let store = store();
        store.set("k1", value(1), Some(0)).unwrap();
        // get() treats it as absent, peek still sees the stale entry
        let peeked = store.peek("k1").unwrap();
        assert_eq!(peeked.value, value(1));
        assert!(peeked.is_expired(now_millis()));
    }

    #[test]
    fn test_empty_collection_refused() {
        let store = store();
        let stored = store
            .set("k1", CachedValue::SearchResultSet(vec![]), None)
            .unwrap();
        assert!(!stored);
        assert_eq!(store.get("k1"), None);
    }

    #[test]
    fn test_empty_counts_map_is_cacheable() {
        let store = store();
        let stored = store
            .set("counts", CachedValue::CategoryCounts(HashMap::new()), None)
            .unwrap();
        assert!(stored);
        assert!(store.has("counts"));
    }

    #[test]
    fn test_empty_key_is_contract_violation() {
        let store = store();
        assert!(matches!(
            store.set("", value(1), None),
            Err(CacheError::EmptyKey)
        ));
    }

    #[test]
    fn test_invalidate_pattern_counts_matches_only() {
        let store = store();
        store.set("cat:1", value(1), None).unwrap();
        store.set("cat:2", value(2), None).unwrap();
        store.set("other:1", value(3), None).unwrap();

        assert_eq!(store.invalidate_pattern("cat:"), 2);
        assert_eq!(store.get("cat:1"), None);
        assert_eq!(store.get("cat:2"), None);
        assert_eq!(store.get("other:1"), Some(value(3)));
    }

    #[test]
    fn test_invalidate_pattern_count_is_exact_under_concurrent_inserts() {
        let store = Arc::new(store());

        // Writers keep inserting non-matching keys while invalidation runs;
        // the returned count must reflect matched removals only and must
        // never wrap from a length snapshot taken mid-mutation.
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for n in 0..500 {
                    store.set(&format!("other:{n}"), value(n), None).unwrap();
                }
            })
        };

        for round in 0..50 {
            store.set(&format!("cat:{round}"), value(round), None).unwrap();
            let removed = store.invalidate_pattern("cat:");
            assert!(removed <= 1, "removed {removed} with one matching key");
            assert_eq!(store.invalidate_pattern("zzz"), 0);
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = store();
        store.set("stale", value(1), Some(0)).unwrap();
        store.set("fresh", value(2), None).unwrap();

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.has("fresh"));
    }

    #[test]
    fn test_clear_keeps_counters() {
        let store = store();
        store.set("k1", value(1), None).unwrap();
        store.get("k1");
        store.get("missing");

        store.clear();
        let stats = store.stats();
        assert_eq!(stats.total_keys, 0);
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
    }

    #[test]
    fn test_stats_accounting() {
        let store = store();
        store.set("a", value(1), None).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        store.set("b", value(2), None).unwrap();

        store.get("a");
        store.get("a");
        store.get("missing");

        let stats = store.stats();
        assert_eq!(stats.total_keys, 2);
        assert_eq!(stats.hit_count, 2);
        assert_eq!(stats.miss_count, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 0.01);
        assert!(stats.estimated_bytes > 0);
        assert_eq!(stats.oldest_key.as_deref(), Some("a"));
        assert_eq!(stats.newest_key.as_deref(), Some("b"));
    }

    #[test]
    fn test_set_overwrites() {
        let store = store();
        store.set("k", value(1), None).unwrap();
        store.set("k", value(2), None).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k"), Some(value(2)));
    }
}
