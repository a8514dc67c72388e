//! # Market Cache
//!
//! Client-side cache-consistency and search-resiliency engine for a
//! marketplace. Keeps locally cached aggregates (category trees, per-category
//! counts, listing result sets) consistent with a remote source of truth
//! without polling, and executes searches with a transparent fallback when
//! the primary search engine is degraded.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Consumers                            │
//! │  • Pages needing counts/trees call fetch_cached()          │
//! │  • Search pages call search()                              │
//! └─────────────────────────────────────────────────────────────┘
//!               │                                │
//!               ▼                                ▼
//! ┌──────────────────────────────┐  ┌──────────────────────────┐
//! │  FetchOrchestrator           │  │  HybridSearchExecutor    │
//! │  • rate-limit window         │  │  • primary ranked path   │
//! │  • single-flight per key     │  │  • rank-preserving join  │
//! │  • stale fallback on failure │  │  • datastore fallback    │
//! └──────────────────────────────┘  └──────────────────────────┘
//!               │
//!               ▼
//! ┌──────────────────────────────┐  ┌──────────────────────────┐
//! │  LocalCacheStore             │←─│  VersionOracleClient     │
//! │  • TTL + lazy expiry         │  │  • once-per-session check│
//! │  • pattern invalidation      │  │  • fail-open on errors   │
//! │  • hit/miss accounting       │  │  • class-wide clears     │
//! └──────────────────────────────┘  └──────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use market_cache::{
//!     CacheEngine, CacheEngineConfig, CachedValue, FetchOptions, ResourceClass,
//!     MemoryVersionStore, SearchQuery,
//! };
//! # use market_cache::{Datastore, SearchEngine, VersionOracle, TransportError,
//! #     SearchResponse, Listing};
//! # use async_trait::async_trait;
//! # struct MyStore; struct MyEngine; struct MyOracle;
//! # #[async_trait] impl Datastore for MyStore {
//! #     async fn query(&self, _: &SearchQuery) -> Result<Vec<Listing>, TransportError> { Ok(vec![]) }
//! #     async fn fetch_by_ids(&self, _: &[String]) -> Result<Vec<Listing>, TransportError> { Ok(vec![]) }
//! # }
//! # #[async_trait] impl SearchEngine for MyEngine {
//! #     async fn search(&self, _: &SearchQuery) -> Result<SearchResponse, TransportError> {
//! #         Err(TransportError::Transport("stub".into()))
//! #     }
//! # }
//! # #[async_trait] impl VersionOracle for MyOracle {
//! #     async fn current_version(&self, _: ResourceClass) -> Result<String, TransportError> { Ok("1".into()) }
//! # }
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Arc::new(CacheEngine::new(
//!         CacheEngineConfig::default(),
//!         Arc::new(MyEngine),
//!         Arc::new(MyStore),
//!         Arc::new(MyOracle),
//!         Arc::new(MemoryVersionStore::new()),
//!     ));
//!     engine.start();
//!
//!     // Cached, rate-limited aggregate fetch
//!     let key = ResourceClass::CategoryCounts.cache_key("all");
//!     let counts = engine
//!         .fetch_cached(
//!             &key,
//!             || async { Ok(CachedValue::CategoryCounts(Default::default())) },
//!             FetchOptions::default().check_version(ResourceClass::CategoryCounts),
//!         )
//!         .await
//!         .unwrap();
//!     println!("counts: {:?}", counts);
//!
//!     // Resilient search
//!     let outcome = engine.search(&SearchQuery::new().category("3")).await;
//!     println!("{} results via {}", outcome.listings.len(), outcome.source);
//!
//!     engine.shutdown();
//! }
//! ```
//!
//! ## Design points
//!
//! - **Never propagate network errors.** Consumers always receive a
//!   renderable value: possibly stale counts, possibly unranked search
//!   results, possibly an empty list. Only programming-contract violations
//!   (an empty cache key, missing config) surface as [`CacheError`].
//! - **At most one version check per resource class per session**, however
//!   many consumers ask.
//! - **Empty-result guard**: a transient empty list is returned to the
//!   caller but never cached, so it cannot poison a TTL window.
//! - **Rank-preserving join**: batched datastore lookups do not guarantee
//!   order; results are re-ordered to the engine's relevance ranking.
//!
//! ## Modules
//!
//! - [`engine`]: the [`CacheEngine`] coordinator
//! - [`store`]: TTL cache with pattern invalidation ([`LocalCacheStore`])
//! - [`version`]: session-scoped stale-cache detection ([`VersionOracleClient`])
//! - [`fetch`]: rate-limited, single-flight fetches ([`FetchOrchestrator`])
//! - [`search`]: hybrid search with datastore fallback ([`HybridSearchExecutor`])
//! - [`transport`]: `reqwest` implementations of the remote capabilities
//! - [`capability`]: collaborator traits and the error taxonomy

pub mod capability;
pub mod config;
pub mod engine;
pub mod fetch;
pub mod metrics;
pub mod resource;
pub mod search;
pub mod store;
pub mod transport;
pub mod version;

pub use capability::{
    CacheError, Datastore, SearchEngine, TransportError, VersionOracle, VersionStore,
};
pub use config::CacheEngineConfig;
pub use engine::CacheEngine;
pub use fetch::{FetchOptions, FetchOrchestrator};
pub use metrics::LatencyTimer;
pub use resource::{CachedValue, Category, Listing, ResourceClass};
pub use search::{
    HybridSearchExecutor, Pagination, SearchHit, SearchOutcome, SearchQuery, SearchResponse,
    SearchSource,
};
pub use store::{CacheEntry, CacheStats, LocalCacheStore};
pub use transport::{HttpSearchEngine, HttpVersionOracle};
pub use version::{MemoryVersionStore, VersionOracleClient};
