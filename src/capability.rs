//! Capability traits for external collaborators.
//!
//! The engine never talks to the network directly; it goes through these
//! traits. Production wires in the HTTP implementations from
//! [`crate::transport`] and a backend-as-a-service datastore client; tests
//! wire in in-memory fakes.

use async_trait::async_trait;
use thiserror::Error;

use crate::resource::{Listing, ResourceClass};
use crate::search::{SearchQuery, SearchResponse};

/// Failure taxonomy for remote calls.
///
/// Timeouts surface as [`TransportError::Transport`]; an empty result is
/// never an error anywhere in this crate.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Network-level failure (connect, timeout, TLS, ...).
    #[error("transport failure: {0}")]
    Transport(String),
    /// The upstream answered with a non-success HTTP status.
    #[error("upstream returned status {0}")]
    Status(u16),
    /// Transport succeeded but the body is structurally invalid.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Programming-contract violations. The only errors allowed to surface past
/// the engine boundary; everything operational degrades silently instead.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache key must not be empty")]
    EmptyKey,
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
    #[error("transport init failed: {0}")]
    TransportInit(String),
}

/// Primary ranked search path.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Execute a search. A structurally valid response with zero hits is a
    /// success, not an error.
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, TransportError>;
}

/// Structured query access to the source-of-truth datastore.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Run the predicate set directly against the datastore, datastore-native
    /// ordering (recency). Used as the search fallback path.
    async fn query(&self, query: &SearchQuery) -> Result<Vec<Listing>, TransportError>;

    /// Batched `in(ids)` lookup. Return order is NOT guaranteed to match the
    /// input order; missing ids are simply absent from the result.
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Listing>, TransportError>;
}

/// Remote authority exposing the current version token per resource class.
#[async_trait]
pub trait VersionOracle: Send + Sync {
    async fn current_version(&self, class: ResourceClass) -> Result<String, TransportError>;
}

/// Durable client-side storage for the last-seen version token per class.
///
/// Persists across sessions (unlike the in-memory session-checked set, which
/// dies with the client). Keys follow `{resource_class}_version`.
pub trait VersionStore: Send + Sync {
    fn get_version(&self, class: ResourceClass) -> Option<String>;
    fn set_version(&self, class: ResourceClass, version: &str);
    fn clear_version(&self, class: ResourceClass);
}
