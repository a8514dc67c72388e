//! Cache entry bookkeeping.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::resource::CachedValue;

/// Current wall clock as epoch millis.
#[must_use]
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A single cached value with its TTL window.
///
/// Invariant: `expires_at == inserted_at + ttl_ms`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: CachedValue,
    /// Insertion timestamp (epoch millis)
    pub inserted_at: i64,
    /// Time-to-live in milliseconds
    pub ttl_ms: i64,
    /// `inserted_at + ttl_ms`
    pub expires_at: i64,
    /// Serialized value size, computed once at insert
    pub value_bytes: usize,
}

impl CacheEntry {
    #[must_use]
    pub fn new(key: String, value: CachedValue, ttl_ms: i64, now: i64) -> Self {
        let value_bytes = value.estimated_bytes();
        Self {
            key,
            inserted_at: now,
            ttl_ms,
            expires_at: now + ttl_ms,
            value_bytes,
            value,
        }
    }

    /// An entry is expired from the instant `now >= inserted_at + ttl_ms`.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Key length plus serialized value length.
    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        self.key.len() + self.value_bytes
    }
}
