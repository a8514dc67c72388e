//! Metrics instrumentation for market-cache.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host process is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `market_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `resource`: resource class or key prefix
//! - `source`: primary, fallback, cache, empty
//! - `outcome`: changed, unchanged, inconclusive, session_skip

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a cache read as hit or miss
pub fn record_cache_access(hit: bool) {
    let status = if hit { "hit" } else { "miss" };
    counter!(
        "market_cache_reads_total",
        "status" => status
    )
    .increment(1);
}

/// Record cache entries removed (reason: expired, pattern, sweep, clear)
pub fn record_cache_eviction(reason: &str, count: usize) {
    counter!(
        "market_cache_evictions_total",
        "reason" => reason.to_string()
    )
    .increment(count as u64);
}

/// Record a refused cache write (empty-collection guard)
pub fn record_cache_write_refused() {
    counter!("market_cache_writes_refused_total").increment(1);
}

/// Set current cache entry count
pub fn set_cache_entries(count: usize) {
    gauge!("market_cache_entries").set(count as f64);
}

/// Set current estimated cache size in bytes
pub fn set_cache_bytes(bytes: usize) {
    gauge!("market_cache_bytes").set(bytes as f64);
}

/// Record a version check outcome (changed, unchanged, inconclusive, session_skip)
pub fn record_version_check(resource: &str, outcome: &str) {
    counter!(
        "market_cache_version_checks_total",
        "resource" => resource.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record how a rate-limited fetch was resolved
/// (remote, cached, rate_limited, deduped, stale_fallback, failed)
pub fn record_fetch(outcome: &str) {
    counter!(
        "market_cache_fetches_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record where search results came from (primary, fallback, empty)
pub fn record_search(source: &str) {
    counter!(
        "market_cache_searches_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// Record hits dropped during the rank-preserving join (deleted between
/// index and fetch)
pub fn record_search_hits_dropped(count: usize) {
    counter!("market_cache_search_hits_dropped_total").increment(count as u64);
}

/// Record remote call latency
pub fn record_latency(target: &str, operation: &str, duration: Duration) {
    histogram!(
        "market_cache_operation_seconds",
        "target" => target.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

// ═══════════════════════════════════════════════════════════════════════════
// LATENCY TIMER - RAII helper
// ═══════════════════════════════════════════════════════════════════════════

/// RAII timer that records latency on drop
pub struct LatencyTimer {
    target: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    #[must_use]
    pub fn new(target: &'static str, operation: &'static str) -> Self {
        Self {
            target,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.target, self.operation, self.start.elapsed());
    }
}
