//! Configuration for the cache engine.
//!
//! # Example
//!
//! ```
//! use market_cache::CacheEngineConfig;
//!
//! // Minimal config (uses defaults)
//! let config = CacheEngineConfig::default();
//! assert_eq!(config.default_ttl_ms, 600_000); // 10 minutes
//!
//! // Full config
//! let config = CacheEngineConfig {
//!     search_base_url: Some("https://search.example.com".into()),
//!     version_base_url: Some("https://api.example.com".into()),
//!     rate_limit_window_ms: 15_000,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;

/// Configuration for the cache engine.
///
/// All fields have sensible defaults. `search_base_url` and
/// `version_base_url` are only required when the built-in HTTP transports
/// are used.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheEngineConfig {
    /// Base URL of the search endpoint (e.g. "https://search.example.com")
    #[serde(default)]
    pub search_base_url: Option<String>,

    /// Base URL of the version oracle (e.g. "https://api.example.com")
    #[serde(default)]
    pub version_base_url: Option<String>,

    /// Default cache entry TTL in milliseconds (default: 10 minutes)
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,

    /// Minimum interval between remote fetches for the same key (default: 30s)
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,

    /// Interval of the proactive expired-entry sweep in milliseconds
    /// (default: 5 minutes; 0 disables the sweep task)
    #[serde(default = "default_cache_sweep_interval_ms")]
    pub cache_sweep_interval_ms: u64,

    /// Whether fetches consult the version oracle before a cold fetch
    #[serde(default = "default_version_check_enabled")]
    pub version_check_enabled: bool,

    /// Per-request timeout for the HTTP transports (default: 10s)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_ttl_ms() -> u64 { 600_000 } // 10 minutes
fn default_rate_limit_window_ms() -> u64 { 30_000 }
fn default_cache_sweep_interval_ms() -> u64 { 300_000 } // 5 minutes
fn default_version_check_enabled() -> bool { true }
fn default_request_timeout_ms() -> u64 { 10_000 }

impl Default for CacheEngineConfig {
    fn default() -> Self {
        Self {
            search_base_url: None,
            version_base_url: None,
            default_ttl_ms: default_ttl_ms(),
            rate_limit_window_ms: default_rate_limit_window_ms(),
            cache_sweep_interval_ms: default_cache_sweep_interval_ms(),
            version_check_enabled: default_version_check_enabled(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}
