// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search query predicates and wire shapes.
//!
//! The same [`SearchQuery`] drives both paths: the search engine receives it
//! as the POST body, the datastore fallback evaluates the predicates as a
//! structured query (free text becomes a substring match there).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Predicate set for a listing search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_max: Option<f64>,
    /// Free text; relevance-ranked on the primary path, substring match on
    /// the fallback path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 { 1 }
fn default_page_size() -> u32 { 20 }

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            category_id: None,
            location: None,
            price_min: None,
            price_max: None,
            text: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl SearchQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn price_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.price_min = min;
        self.price_max = max;
        self
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    /// Stable cache-key suffix for this predicate set.
    #[must_use]
    pub fn cache_suffix(&self) -> String {
        format!(
            "search:cat={}:loc={}:min={}:max={}:q={}:page={}:size={}",
            self.category_id.as_deref().unwrap_or("*"),
            self.location.as_deref().unwrap_or("*"),
            self.price_min.map(|v| v.to_string()).unwrap_or_else(|| "*".into()),
            self.price_max.map(|v| v.to_string()).unwrap_or_else(|| "*".into()),
            self.text.as_deref().unwrap_or("*"),
            self.page,
            self.page_size,
        )
    }
}

/// One ranked, partial-record hit from the search engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    /// Whatever partial fields the engine indexed alongside id and score.
    #[serde(flatten)]
    pub source_fields: HashMap<String, Value>,
}

/// Pagination metadata, passed through from the search engine response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl Pagination {
    /// Pagination for a locally produced result set (fallback path).
    #[must_use]
    pub fn of_results(total: u64, query: &SearchQuery) -> Self {
        let page_size = query.page_size.max(1);
        Self {
            total,
            page: query.page,
            page_size,
            total_pages: total.div_ceil(page_size as u64) as u32,
        }
    }

    #[must_use]
    pub fn empty(query: &SearchQuery) -> Self {
        Self::of_results(0, query)
    }
}

/// Wire shape of the search endpoint response.
///
/// `data` is deliberately NOT defaulted: a payload without a hits array is
/// structurally invalid and must surface as a parse failure, which is what
/// routes the executor onto the fallback path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    pub data: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_suffix_is_stable_and_parameterized() {
        let query = SearchQuery::new().category("3").page(2, 20);
        assert_eq!(
            query.cache_suffix(),
            "search:cat=3:loc=*:min=*:max=*:q=*:page=2:size=20"
        );
    }

    #[test]
    fn test_hit_deserializes_extra_fields() {
        let hit: SearchHit =
            serde_json::from_value(json!({"id": "l1", "score": 0.9, "title": "Bike"})).unwrap();
        assert_eq!(hit.id, "l1");
        assert_eq!(hit.source_fields.get("title"), Some(&json!("Bike")));
    }

    #[test]
    fn test_response_without_hits_array_is_invalid() {
        let malformed = json!({"success": true});
        assert!(serde_json::from_value::<SearchResponse>(malformed).is_err());
    }

    #[test]
    fn test_fallback_pagination_math() {
        let query = SearchQuery::new().page(1, 20);
        let p = Pagination::of_results(45, &query);
        assert_eq!(p.total_pages, 3);
        assert_eq!(Pagination::empty(&query).total, 0);
    }

    #[test]
    fn test_query_defaults() {
        let query: SearchQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 20);
    }
}
