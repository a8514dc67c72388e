// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Hybrid Search
//!
//! Search execution that prefers the dedicated search engine and degrades
//! transparently to a structured datastore query when the engine is down.
//!
//! # Architecture
//!
//! ```text
//! search(query)
//!       │
//!       ├─→ Search Engine (ranked hits)
//!       │        │
//!       │        ├─→ zero hits → Empty (a valid answer, no fallback)
//!       │        │
//!       │        └─→ hits → batched datastore lookup
//!       │                 → rank-preserving join → Primary
//!       │
//!       └─→ transport error / non-success / malformed payload
//!                → same predicates against the Datastore
//!                → recency order → Fallback
//! ```
//!
//! The executor never raises: every failure mode resolves to primary ranked
//! results, fallback unranked results, or empty results.

mod executor;
mod query;

pub use executor::{HybridSearchExecutor, SearchOutcome, SearchSource};
pub use query::{Pagination, SearchHit, SearchQuery, SearchResponse};
