// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Version Oracle Client
//!
//! Keeps locally cached aggregates consistent with the remote source of truth
//! without polling. Each resource class has a remote version token; when the
//! token diverges from the locally persisted one, every cache key of that
//! class is invalidated — at most once per session.
//!
//! # State machine (per resource class, per session)
//!
//! ```text
//! Unchecked ──remote == local──→ Checked(no-op)
//!     │
//!     ├────remote != local──→ invalidate + persist → Checked(invalidated)
//!     │
//!     └────transport failure──→ Unchecked   (fail-open, retry later)
//! ```
//!
//! `Checked` is terminal for the session: further calls return immediately
//! with no network traffic. A new session (new client, new epoch) resets to
//! `Unchecked`.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::capability::{VersionOracle, VersionStore};
use crate::metrics;
use crate::resource::ResourceClass;
use crate::store::LocalCacheStore;

/// In-memory [`VersionStore`], suitable for tests and single-session use.
/// Durable implementations (browser local storage, a settings file) live
/// with the host.
#[derive(Default)]
pub struct MemoryVersionStore {
    versions: DashMap<String, String>,
}

impl MemoryVersionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl VersionStore for MemoryVersionStore {
    fn get_version(&self, class: ResourceClass) -> Option<String> {
        self.versions.get(&class.version_key()).map(|v| v.clone())
    }

    fn set_version(&self, class: ResourceClass, version: &str) {
        self.versions.insert(class.version_key(), version.to_string());
    }

    fn clear_version(&self, class: ResourceClass) {
        self.versions.remove(&class.version_key());
    }
}

/// Session-scoped stale-cache detector.
pub struct VersionOracleClient {
    oracle: Arc<dyn VersionOracle>,
    store: Arc<dyn VersionStore>,
    cache: Arc<LocalCacheStore>,
    /// Classes already checked this session. In-memory on purpose: dies with
    /// the client, which is exactly the session boundary.
    session_checked: DashMap<ResourceClass, ()>,
    /// Explicit session identity, fixed at construction.
    session_epoch: u64,
}

impl VersionOracleClient {
    pub fn new(
        oracle: Arc<dyn VersionOracle>,
        store: Arc<dyn VersionStore>,
        cache: Arc<LocalCacheStore>,
        session_epoch: u64,
    ) -> Self {
        debug!(session_epoch, "version oracle client created");
        Self {
            oracle,
            store,
            cache,
            session_checked: DashMap::new(),
            session_epoch,
        }
    }

    /// Check whether the remote version for `class` has moved past the
    /// locally persisted one, invalidating the class's cache keys if so.
    ///
    /// Returns `true` only when an invalidation happened. At most one remote
    /// call is made per class per session, independent of call volume. An
    /// inconclusive check (transport failure, non-success payload) is
    /// fail-open: it returns `false`, preserves the cache, and does NOT
    /// consume the session check, so a later call may retry.
    pub async fn check_version(&self, class: ResourceClass) -> bool {
        if self.session_checked.contains_key(&class) {
            metrics::record_version_check(class.as_str(), "session_skip");
            return false;
        }

        let timer = metrics::LatencyTimer::new("oracle", "version");
        let remote = match self.oracle.current_version(class).await {
            Ok(version) => version,
            Err(e) => {
                drop(timer);
                warn!(resource = %class, error = %e, "version check inconclusive, keeping cache");
                metrics::record_version_check(class.as_str(), "inconclusive");
                return false;
            }
        };
        drop(timer);

        let local = self.store.get_version(class);
        let changed = match local {
            Some(ref local) if local != &remote => {
                let removed = self.cache.invalidate_pattern(class.as_str());
                info!(
                    resource = %class,
                    local = %local,
                    remote = %remote,
                    removed,
                    session_epoch = self.session_epoch,
                    "version changed, cache invalidated"
                );
                metrics::record_version_check(class.as_str(), "changed");
                true
            }
            _ => {
                // First sighting persists the token without invalidating:
                // there is nothing of that vintage in the cache to clear.
                debug!(resource = %class, version = %remote, "version unchanged");
                metrics::record_version_check(class.as_str(), "unchanged");
                false
            }
        };

        self.store.set_version(class, &remote);
        self.session_checked.insert(class, ());
        changed
    }

    /// Unconditionally invalidate a class and forget its persisted version.
    ///
    /// Manual/debug recovery path, independent of the session state machine:
    /// a later `check_version` this session still short-circuits if the class
    /// was already checked.
    pub fn force_invalidate(&self, class: ResourceClass) -> usize {
        let removed = self.cache.invalidate_pattern(class.as_str());
        self.store.clear_version(class);
        info!(resource = %class, removed, "forced invalidation");
        removed
    }

    /// The session identity this client was constructed with.
    #[must_use]
    pub fn session_epoch(&self) -> u64 {
        self.session_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::TransportError;
    use crate::resource::CachedValue;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeOracle {
        version: parking_lot::Mutex<String>,
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl FakeOracle {
        fn new(version: &str) -> Self {
            Self {
                version: parking_lot::Mutex::new(version.to_string()),
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl VersionOracle for FakeOracle {
        async fn current_version(&self, _class: ResourceClass) -> Result<String, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(TransportError::Transport("connection refused".into()));
            }
            Ok(self.version.lock().clone())
        }
    }

    fn client(
        oracle: Arc<FakeOracle>,
        store: Arc<MemoryVersionStore>,
        cache: Arc<LocalCacheStore>,
    ) -> VersionOracleClient {
        VersionOracleClient::new(oracle, store, cache, 1)
    }

    #[tokio::test]
    async fn test_first_sighting_persists_without_invalidation() {
        let oracle = Arc::new(FakeOracle::new("v1"));
        let store = Arc::new(MemoryVersionStore::new());
        let cache = Arc::new(LocalCacheStore::new(60_000));
        cache
            .set("categories:tree", CachedValue::Json(json!(1)), None)
            .unwrap();

        let client = client(oracle, store.clone(), cache.clone());
        assert!(!client.check_version(ResourceClass::Categories).await);
        assert!(cache.has("categories:tree"));
        assert_eq!(
            store.get_version(ResourceClass::Categories).as_deref(),
            Some("v1")
        );
    }

    #[tokio::test]
    async fn test_at_most_one_remote_call_per_session() {
        let oracle = Arc::new(FakeOracle::new("v1"));
        let store = Arc::new(MemoryVersionStore::new());
        let cache = Arc::new(LocalCacheStore::new(60_000));

        let client = client(oracle.clone(), store, cache);
        client.check_version(ResourceClass::Categories).await;
        client.check_version(ResourceClass::Categories).await;
        client.check_version(ResourceClass::Categories).await;
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_version_change_invalidates_class_keys() {
        let oracle = Arc::new(FakeOracle::new("v2"));
        let store = Arc::new(MemoryVersionStore::new());
        store.set_version(ResourceClass::Categories, "v1");
        let cache = Arc::new(LocalCacheStore::new(60_000));
        cache
            .set("categories:tree", CachedValue::Json(json!(1)), None)
            .unwrap();
        cache
            .set("listings:search:cat=3", CachedValue::Json(json!(2)), None)
            .unwrap();

        let client = client(oracle, store.clone(), cache.clone());
        assert!(client.check_version(ResourceClass::Categories).await);

        assert!(!cache.has("categories:tree"));
        // Other classes untouched
        assert!(cache.has("listings:search:cat=3"));
        assert_eq!(
            store.get_version(ResourceClass::Categories).as_deref(),
            Some("v2")
        );
    }

    #[tokio::test]
    async fn test_inconclusive_check_is_fail_open_and_retryable() {
        let oracle = Arc::new(FakeOracle::new("v2"));
        oracle.fail.store(true, Ordering::SeqCst);
        let store = Arc::new(MemoryVersionStore::new());
        store.set_version(ResourceClass::Categories, "v1");
        let cache = Arc::new(LocalCacheStore::new(60_000));
        cache
            .set("categories:tree", CachedValue::Json(json!(1)), None)
            .unwrap();

        let client = client(oracle.clone(), store.clone(), cache.clone());
        assert!(!client.check_version(ResourceClass::Categories).await);
        // Stale-but-available over unavailable
        assert!(cache.has("categories:tree"));
        assert_eq!(
            store.get_version(ResourceClass::Categories).as_deref(),
            Some("v1")
        );

        // Failure did not consume the session check; recovery retries.
        oracle.fail.store(false, Ordering::SeqCst);
        assert!(client.check_version(ResourceClass::Categories).await);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
        assert!(!cache.has("categories:tree"));
    }

    #[tokio::test]
    async fn test_new_session_checks_again() {
        let oracle = Arc::new(FakeOracle::new("v1"));
        let store = Arc::new(MemoryVersionStore::new());
        let cache = Arc::new(LocalCacheStore::new(60_000));

        let first = VersionOracleClient::new(oracle.clone(), store.clone(), cache.clone(), 1);
        first.check_version(ResourceClass::Listings).await;
        drop(first);

        // New session, new client: version moved in between.
        *oracle.version.lock() = "v2".to_string();
        cache
            .set("listings:search:cat=3", CachedValue::Json(json!(2)), None)
            .unwrap();
        let second = VersionOracleClient::new(oracle.clone(), store, cache.clone(), 2);
        assert!(second.check_version(ResourceClass::Listings).await);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
        assert!(!cache.has("listings:search:cat=3"));
    }

    #[tokio::test]
    async fn test_force_invalidate_ignores_session_state() {
        let oracle = Arc::new(FakeOracle::new("v1"));
        let store = Arc::new(MemoryVersionStore::new());
        let cache = Arc::new(LocalCacheStore::new(60_000));
        cache
            .set("categories:tree", CachedValue::Json(json!(1)), None)
            .unwrap();

        let client = client(oracle, store.clone(), cache.clone());
        client.check_version(ResourceClass::Categories).await;

        let removed = client.force_invalidate(ResourceClass::Categories);
        assert_eq!(removed, 1);
        assert!(store.get_version(ResourceClass::Categories).is_none());
        assert!(!cache.has("categories:tree"));
    }
}
