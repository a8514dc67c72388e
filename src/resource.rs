//! Marketplace resource model.
//!
//! Cached aggregates are modelled as a closed set of [`ResourceClass`]es and a
//! tagged [`CachedValue`] enum rather than untyped JSON blobs, so invalidation
//! and serialization are exhaustively checked.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// A named class of cacheable remote data.
///
/// Each class has its own remote version counter and its own family of cache
/// keys, all sharing the class name as a key prefix so that pattern
/// invalidation can clear the whole family at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceClass {
    /// The category tree.
    Categories,
    /// Per-category listing counts.
    CategoryCounts,
    /// Listing records and parameterized listing searches.
    Listings,
}

impl ResourceClass {
    /// All known resource classes.
    pub const ALL: [ResourceClass; 3] = [
        ResourceClass::Categories,
        ResourceClass::CategoryCounts,
        ResourceClass::Listings,
    ];

    /// Stable wire/key name for this class.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::CategoryCounts => "category-counts",
            Self::Listings => "listings",
        }
    }

    /// Key under which the locally persisted version token is stored.
    #[must_use]
    pub fn version_key(&self) -> String {
        format!("{}_version", self.as_str())
    }

    /// Build a cache key for this class from a parameter suffix.
    ///
    /// Keys produced here always contain `as_str()` as a substring, which is
    /// what class-wide pattern invalidation relies on.
    #[must_use]
    pub fn cache_key(&self, suffix: &str) -> String {
        format!("{}:{}", self.as_str(), suffix)
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the marketplace category tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// A full marketplace listing record, as returned by the datastore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category_id: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Creation timestamp (epoch millis). Datastore-native ordering is by
    /// recency on this field.
    pub created_at: i64,
}

/// Tagged payload stored in the cache, one variant per cacheable shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum CachedValue {
    /// The full category tree.
    CategoryTree(Vec<Category>),
    /// Listing counts keyed by category id. An empty map is a valid report
    /// ("zero categories"), not a degenerate fetch.
    CategoryCounts(HashMap<String, u64>),
    /// A materialized listing result set (e.g. a parameterized search page).
    SearchResultSet(Vec<Listing>),
    /// Escape hatch for consumers with payloads outside the closed set.
    Json(Value),
}

impl CachedValue {
    /// Whether this value is an empty collection that the cache-write guard
    /// must refuse.
    ///
    /// Empty *lists* are refused: a transient empty response cached for the
    /// full TTL window would poison every consumer until expiry. An empty
    /// *map* of counts is first-class "no data to report" and stays cacheable.
    #[must_use]
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Self::CategoryTree(v) => v.is_empty(),
            Self::SearchResultSet(v) => v.is_empty(),
            Self::CategoryCounts(_) => false,
            Self::Json(v) => matches!(v, Value::Array(a) if a.is_empty()),
        }
    }

    /// Best-effort serialized size, used for cache byte accounting.
    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }

    /// Number of elements for collection variants.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::CategoryTree(v) => v.len(),
            Self::CategoryCounts(m) => m.len(),
            Self::SearchResultSet(v) => v.len(),
            Self::Json(Value::Array(a)) => a.len(),
            Self::Json(Value::Object(o)) => o.len(),
            Self::Json(_) => 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
