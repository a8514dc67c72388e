// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine coordinator.
//!
//! [`CacheEngine`] wires the four components together: one shared
//! [`LocalCacheStore`], a session-scoped [`VersionOracleClient`], the
//! [`FetchOrchestrator`], and the [`HybridSearchExecutor`]. It is constructed
//! once at process start and handed by `Arc` to every consumer; there is no
//! global state.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::capability::{
    CacheError, Datastore, SearchEngine, TransportError, VersionOracle, VersionStore,
};
use crate::config::CacheEngineConfig;
use crate::fetch::{FetchOptions, FetchOrchestrator};
use crate::resource::{CachedValue, ResourceClass};
use crate::search::{HybridSearchExecutor, SearchOutcome, SearchQuery};
use crate::store::{now_millis, CacheStats, LocalCacheStore};
use crate::transport::{HttpSearchEngine, HttpVersionOracle};
use crate::version::VersionOracleClient;

/// The assembled cache-consistency and search-resiliency engine.
pub struct CacheEngine {
    config: CacheEngineConfig,
    store: Arc<LocalCacheStore>,
    version: Arc<VersionOracleClient>,
    fetcher: Arc<FetchOrchestrator>,
    search: HybridSearchExecutor,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
}

impl CacheEngine {
    /// Assemble an engine from explicit collaborators.
    ///
    /// The session epoch is taken from the wall clock at construction; a new
    /// engine instance is a new session as far as version checks go.
    pub fn new(
        config: CacheEngineConfig,
        search_engine: Arc<dyn SearchEngine>,
        datastore: Arc<dyn Datastore>,
        oracle: Arc<dyn VersionOracle>,
        version_store: Arc<dyn VersionStore>,
    ) -> Self {
        let store = Arc::new(LocalCacheStore::new(config.default_ttl_ms));
        let session_epoch = now_millis() as u64;
        let version = Arc::new(VersionOracleClient::new(
            oracle,
            version_store,
            store.clone(),
            session_epoch,
        ));
        let fetcher = Arc::new(FetchOrchestrator::new(
            store.clone(),
            version.clone(),
            config.rate_limit_window_ms,
        ));
        let search = HybridSearchExecutor::new(search_engine, datastore);
        info!(session_epoch, "cache engine created");
        Self {
            config,
            store,
            version,
            fetcher,
            search,
            sweep_task: Mutex::new(None),
        }
    }

    /// Assemble an engine whose search engine and version oracle are the
    /// built-in HTTP transports, configured from `search_base_url` and
    /// `version_base_url`. The datastore client remains caller-provided.
    ///
    /// # Errors
    ///
    /// [`CacheError::MissingConfig`] when a base URL is absent.
    pub fn with_http(
        config: CacheEngineConfig,
        datastore: Arc<dyn Datastore>,
        version_store: Arc<dyn VersionStore>,
    ) -> Result<Self, CacheError> {
        let search_url = config
            .search_base_url
            .clone()
            .ok_or(CacheError::MissingConfig("search_base_url"))?;
        let version_url = config
            .version_base_url
            .clone()
            .ok_or(CacheError::MissingConfig("version_base_url"))?;

        let search_engine = HttpSearchEngine::new(search_url, config.request_timeout_ms)
            .map_err(|e| CacheError::TransportInit(e.to_string()))?;
        let oracle = HttpVersionOracle::new(version_url, config.request_timeout_ms)
            .map_err(|e| CacheError::TransportInit(e.to_string()))?;

        Ok(Self::new(
            config,
            Arc::new(search_engine),
            datastore,
            Arc::new(oracle),
            version_store,
        ))
    }

    /// Start the periodic expired-entry sweep (no-op when the configured
    /// interval is 0 or a sweep is already running).
    pub fn start(&self) {
        let interval_ms = self.config.cache_sweep_interval_ms;
        if interval_ms == 0 {
            debug!("cache sweep disabled");
            return;
        }
        let mut slot = self.sweep_task.lock();
        if slot.is_some() {
            return;
        }
        let store = self.store.clone();
        let fetcher = self.fetcher.clone();
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            // First tick fires immediately; skip it so the sweep cadence
            // starts one interval after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep();
                let pruned = fetcher.prune();
                if removed > 0 || pruned > 0 {
                    debug!(removed, pruned, "periodic sweep");
                }
            }
        }));
        info!(interval_ms, "cache sweep started");
    }

    /// Stop the sweep task. Idempotent.
    pub fn shutdown(&self) {
        if let Some(task) = self.sweep_task.lock().take() {
            task.abort();
            info!("cache engine shut down");
        }
    }

    /// Fetch a cached resource through the rate-limited orchestrator.
    ///
    /// `remote` is only invoked on a cold or expired key outside the
    /// rate-limit window; see [`FetchOrchestrator::fetch`].
    ///
    /// # Errors
    ///
    /// Only [`CacheError::EmptyKey`].
    pub async fn fetch_cached<F, Fut>(
        &self,
        key: &str,
        remote: F,
        options: FetchOptions,
    ) -> Result<CachedValue, CacheError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<CachedValue, TransportError>>,
    {
        let options = if self.config.version_check_enabled {
            options
        } else {
            FetchOptions {
                check_version: None,
                ..options
            }
        };
        self.fetcher.fetch(key, remote, options).await
    }

    /// Execute a hybrid search. Never fails; see [`HybridSearchExecutor`].
    pub async fn search(&self, query: &SearchQuery) -> SearchOutcome {
        self.search.search(query).await
    }

    /// Run the session-scoped version check for a resource class.
    pub async fn check_version(&self, class: ResourceClass) -> bool {
        if !self.config.version_check_enabled {
            return false;
        }
        self.version.check_version(class).await
    }

    /// Manual/debug recovery: drop a class's cache keys, governor stamps, and
    /// persisted version.
    pub fn force_invalidate(&self, class: ResourceClass) -> usize {
        // Governor stamps carry full cache keys (`categories:tree`), so the
        // reset matches by substring just like the cache invalidation does.
        self.fetcher.reset_governors_matching(class.as_str());
        self.version.force_invalidate(class)
    }

    /// Direct handle to the shared cache store.
    #[must_use]
    pub fn store(&self) -> &Arc<LocalCacheStore> {
        &self.store
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }
}

impl Drop for CacheEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
