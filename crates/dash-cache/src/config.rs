//! Cache configuration options

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time-to-live for cached results, in seconds
pub const DEFAULT_TTL_SECS: u64 = 600;

/// Configuration for the query cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum age of a cached result before it is recomputed
    pub ttl: Duration,
    /// Maximum number of distinct queries kept; least recently used goes first
    pub max_entries: usize,
    /// Whether results are cached at all
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            max_entries: 64,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Default configuration with a custom TTL
    pub fn from_ttl_seconds(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            ..Default::default()
        }
    }

    /// A configuration where every fetch goes to the backend
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the time-to-live
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the maximum number of cached queries
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Enable or disable caching
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
