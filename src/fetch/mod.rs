// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Rate-Limited Fetch Orchestrator
//!
//! Wraps a remote fetch for a specific cache key with a minimum inter-call
//! interval, cache short-circuiting, optional version pre-check, and a
//! stale-value fallback on failure. Callers always receive a usable value;
//! no failure propagates past this boundary.
//!
//! # Flow
//!
//! ```text
//! fetch(key, remote_fn)
//!   │
//!   ├─→ inside rate-limit window + anything cached (even stale)? → return it
//!   │
//!   ├─→ acquire per-key in-flight lock (single-flight)
//!   │        ├─→ fresh entry appeared while waiting? → return it
//!   │        └─→ an attempt concluded while waiting? → share its outcome
//!   │
//!   ├─→ optional version oracle pre-check (clears known-stale entries)
//!   │
//!   └─→ remote_fn()
//!            ├─→ non-empty → cache + stamp governor → return
//!            ├─→ empty     → return uncached (no TTL poisoning)
//!            └─→ failure   → stale cached value if any, else empty default
//! ```

use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::capability::{CacheError, TransportError};
use crate::metrics;
use crate::resource::{CachedValue, ResourceClass};
use crate::store::{now_millis, LocalCacheStore};
use crate::version::VersionOracleClient;

/// Per-call options for [`FetchOrchestrator::fetch`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// TTL for a successful result (`None` = store default)
    pub ttl_ms: Option<u64>,
    /// Rate-limit window for this key (`None` = engine default)
    pub min_interval_ms: Option<u64>,
    /// Consult the version oracle for this class before a cold fetch
    pub check_version: Option<ResourceClass>,
    /// Value handed back when the fetch fails and nothing is cached.
    /// Pick the shape the caller can render (e.g. an empty result set).
    pub fallback_empty: CachedValue,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            ttl_ms: None,
            min_interval_ms: None,
            check_version: None,
            fallback_empty: CachedValue::Json(serde_json::Value::Null),
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    #[must_use]
    pub fn min_interval_ms(mut self, interval: u64) -> Self {
        self.min_interval_ms = Some(interval);
        self
    }

    #[must_use]
    pub fn check_version(mut self, class: ResourceClass) -> Self {
        self.check_version = Some(class);
        self
    }

    #[must_use]
    pub fn fallback_empty(mut self, value: CachedValue) -> Self {
        self.fallback_empty = value;
        self
    }
}

/// Serializes and rate-limits remote fetches per cache key.
pub struct FetchOrchestrator {
    cache: Arc<LocalCacheStore>,
    version: Arc<VersionOracleClient>,
    /// last_fetch_at (epoch millis) per key; stamped on successful non-empty
    /// fetches only, so empty or failed calls stay immediately retryable.
    governors: DashMap<String, i64>,
    /// Per-key in-flight guard. The guarded value is the epoch-millis instant
    /// the last remote attempt under this lock concluded; a waiter whose
    /// arrival predates it shares that attempt's outcome instead of
    /// re-dialing. [`Self::prune`] drops guards nobody holds.
    in_flight: DashMap<String, Arc<Mutex<i64>>>,
    default_window_ms: i64,
    /// Largest rate-limit window any call has used; stamps older than this
    /// are dead weight and get pruned.
    max_window_ms: AtomicI64,
}

impl FetchOrchestrator {
    pub fn new(
        cache: Arc<LocalCacheStore>,
        version: Arc<VersionOracleClient>,
        default_window_ms: u64,
    ) -> Self {
        Self {
            cache,
            version,
            governors: DashMap::new(),
            in_flight: DashMap::new(),
            default_window_ms: default_window_ms as i64,
            max_window_ms: AtomicI64::new(default_window_ms as i64),
        }
    }

    /// Fetch `key`, preferring cache over network and never failing.
    ///
    /// Within the rate-limit window an existing cache entry is returned even
    /// if logically stale; rate limiting takes precedence over freshness. A
    /// first-ever fetch is never rate-limited. Concurrent calls for the same
    /// key share one underlying remote call.
    ///
    /// # Errors
    ///
    /// Only [`CacheError::EmptyKey`] (contract violation). Every operational
    /// failure resolves to a cached or empty value.
    pub async fn fetch<F, Fut>(
        &self,
        key: &str,
        remote: F,
        options: FetchOptions,
    ) -> Result<CachedValue, CacheError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<CachedValue, TransportError>>,
    {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }

        let arrived_at = now_millis();
        let window = options
            .min_interval_ms
            .map(|w| w as i64)
            .unwrap_or(self.default_window_ms);
        self.max_window_ms.fetch_max(window, Ordering::Relaxed);

        // Rate limit: inside the window, any cached value wins, stale or not.
        if let Some(last) = self.governors.get(key).map(|v| *v) {
            if arrived_at - last < window {
                if let Some(entry) = self.cache.peek(key) {
                    debug!(key = %key, "rate-limited, returning cached value");
                    metrics::record_fetch("rate_limited");
                    return Ok(entry.value);
                }
                // Nothing cached at all: let the fetch proceed.
            }
        }

        // Single-flight: one outstanding remote call per key.
        let lock = self
            .in_flight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(0)))
            .clone();
        let mut last_attempt = lock.lock().await;

        // A waiter that arrived while the winner was fetching finds the
        // winner's result here and never hits the network.
        if let Some(entry) = self.cache.peek(key) {
            if !entry.is_expired(now_millis()) {
                metrics::record_fetch("cached");
                return Ok(entry.value);
            }
        }

        // An attempt concluded after this caller arrived but cached nothing
        // (failure or empty result). Share its degraded outcome instead of
        // re-dialing a backend that just answered.
        if *last_attempt > arrived_at {
            if let Some(entry) = self.cache.peek(key) {
                debug!(key = %key, "sharing last-known value from concluded attempt");
                metrics::record_fetch("stale_fallback");
                return Ok(entry.value);
            }
            metrics::record_fetch("failed");
            return Ok(options.fallback_empty);
        }

        // Clear a known-stale entry before refetching, at most once per
        // session per class.
        if let Some(class) = options.check_version {
            self.version.check_version(class).await;
        }

        let timer = metrics::LatencyTimer::new("resource", "fetch");
        let outcome = remote().await;
        drop(timer);
        *last_attempt = now_millis();

        match outcome {
            Ok(value) => {
                if value.is_empty_collection() {
                    // A transient empty response must not occupy the cache
                    // for a full TTL window.
                    debug!(key = %key, "empty remote result, returned uncached");
                    metrics::record_fetch("remote");
                    return Ok(value);
                }
                self.cache.set(key, value.clone(), options.ttl_ms)?;
                self.governors.insert(key.to_string(), now_millis());
                metrics::record_fetch("remote");
                Ok(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "remote fetch failed");
                if let Some(entry) = self.cache.peek(key) {
                    debug!(key = %key, "serving last-known value after failure");
                    metrics::record_fetch("stale_fallback");
                    return Ok(entry.value);
                }
                metrics::record_fetch("failed");
                Ok(options.fallback_empty)
            }
        }
    }

    /// Forget governor stamps for every key containing `substring`; returns
    /// the number cleared. Keyed the same way as the cache store's pattern
    /// invalidation, so clearing a resource class clears its stamps too.
    pub fn reset_governors_matching(&self, substring: &str) -> usize {
        let removed = AtomicUsize::new(0);
        self.governors.retain(|key, _| {
            if key.contains(substring) {
                removed.fetch_add(1, Ordering::Relaxed);
                false
            } else {
                true
            }
        });
        removed.into_inner()
    }

    /// Drop bookkeeping that is no longer load-bearing: governor stamps older
    /// than the largest window in use, and in-flight guards nobody holds.
    /// Runs from the engine's periodic sweep so both maps track the live key
    /// set instead of growing with every key ever fetched. Returns the number
    /// of stamps dropped.
    pub fn prune(&self) -> usize {
        let horizon = self.max_window_ms.load(Ordering::Relaxed);
        let now = now_millis();
        let removed = AtomicUsize::new(0);
        self.governors.retain(|_, last| {
            if now - *last >= horizon {
                removed.fetch_add(1, Ordering::Relaxed);
                false
            } else {
                true
            }
        });
        // A sole Arc reference means no caller holds or awaits this guard; a
        // racing caller re-creates the entry and still serializes correctly.
        self.in_flight.retain(|_, lock| Arc::strong_count(lock) > 1);
        removed.into_inner()
    }

    #[cfg(test)]
    pub(crate) fn governor_stamp(&self, key: &str) -> Option<i64> {
        self.governors.get(key).map(|v| *v)
    }
}
