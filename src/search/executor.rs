// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Hybrid search executor.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::capability::{Datastore, SearchEngine};
use crate::metrics;
use crate::resource::Listing;

use super::query::{Pagination, SearchQuery, SearchResponse};

/// Where search results came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSource {
    /// Ranked results from the search engine, enriched from the datastore.
    Primary,
    /// Structured datastore query, recency order (ranking sacrificed,
    /// availability preserved).
    Fallback,
    /// A valid zero-result answer.
    Empty,
}

impl std::fmt::Display for SearchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// Search results with provenance and pagination metadata.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub listings: Vec<Listing>,
    pub source: SearchSource,
    pub pagination: Pagination,
}

impl SearchOutcome {
    fn empty(query: &SearchQuery, pagination: Option<Pagination>) -> Self {
        Self {
            listings: Vec::new(),
            source: SearchSource::Empty,
            pagination: pagination.unwrap_or_else(|| Pagination::empty(query)),
        }
    }
}

/// Executes searches against the primary engine with a datastore fallback.
///
/// Does not participate in the version-oracle flow: results are not cached,
/// the fallback path itself is the resiliency mechanism.
pub struct HybridSearchExecutor {
    engine: Arc<dyn SearchEngine>,
    datastore: Arc<dyn Datastore>,
}

impl HybridSearchExecutor {
    pub fn new(engine: Arc<dyn SearchEngine>, datastore: Arc<dyn Datastore>) -> Self {
        Self { engine, datastore }
    }

    /// Execute a search. Never raises; every failure mode resolves to one of
    /// primary ranked results, fallback unranked results, or empty results.
    pub async fn search(&self, query: &SearchQuery) -> SearchOutcome {
        let timer = metrics::LatencyTimer::new("search", "query");
        let response = self.engine.search(query).await;
        drop(timer);

        match response {
            Ok(response) if response.success => self.enrich(query, response).await,
            Ok(_) => {
                warn!("search engine reported failure, using datastore fallback");
                self.fallback(query).await
            }
            Err(e) => {
                warn!(error = %e, "search engine unreachable, using datastore fallback");
                self.fallback(query).await
            }
        }
    }

    /// Rank-preserving join: fetch full records for the hit ids in one
    /// batched lookup, then reorder to the engine's relevance order. Ids
    /// with no record (deleted between index and fetch) are dropped, never
    /// null-padded.
    async fn enrich(&self, query: &SearchQuery, response: SearchResponse) -> SearchOutcome {
        if response.data.is_empty() {
            // Zero hits is a correct answer, not a failure.
            debug!("search returned zero hits");
            metrics::record_search("empty");
            return SearchOutcome::empty(query, response.pagination);
        }

        let ids: Vec<String> = response.data.iter().map(|hit| hit.id.clone()).collect();
        let records = match self.datastore.fetch_by_ids(&ids).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "hit enrichment failed, using datastore fallback");
                return self.fallback(query).await;
            }
        };

        // The batched `in(ids)` lookup does not guarantee return order.
        let mut by_id: HashMap<String, Listing> = records
            .into_iter()
            .map(|listing| (listing.id.clone(), listing))
            .collect();
        let listings: Vec<Listing> = ids.iter().filter_map(|id| by_id.remove(id)).collect();

        let dropped = ids.len() - listings.len();
        if dropped > 0 {
            debug!(dropped, "hits without a datastore record were dropped");
            metrics::record_search_hits_dropped(dropped);
        }

        let pagination = response
            .pagination
            .unwrap_or_else(|| Pagination::of_results(listings.len() as u64, query));
        metrics::record_search("primary");
        SearchOutcome {
            listings,
            source: SearchSource::Primary,
            pagination,
        }
    }

    /// Structured query with the same predicates, datastore-native ordering.
    async fn fallback(&self, query: &SearchQuery) -> SearchOutcome {
        match self.datastore.query(query).await {
            Ok(listings) => {
                metrics::record_search("fallback");
                let pagination = Pagination::of_results(listings.len() as u64, query);
                SearchOutcome {
                    listings,
                    source: SearchSource::Fallback,
                    pagination,
                }
            }
            Err(e) => {
                // Both paths down: the caller still gets a renderable value.
                warn!(error = %e, "datastore fallback failed, returning empty results");
                metrics::record_search("empty");
                SearchOutcome::empty(query, None)
            }
        }
    }
}
