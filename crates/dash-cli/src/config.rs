use anyhow::{Context, Result};
use dash_cache::{CacheConfig, DEFAULT_TTL_SECS};
use dash_source::FlightOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds a cached report result stays valid
    pub ttl_seconds: u64,
    pub max_entries: usize,
    pub cache_enabled: bool,
    /// Arrow Flight endpoint of the analytical store
    pub endpoint: Option<String>,
    pub connect_timeout_secs: u64,
    /// Optional cap on each query round trip; unset leaves it to the server
    pub request_timeout_secs: Option<u64>,
    /// Rows printed per report table
    pub max_rows: usize,
    pub show_timing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECS,
            max_entries: 64,
            cache_enabled: true,
            endpoint: None,
            connect_timeout_secs: 10,
            request_timeout_secs: None,
            max_rows: 20,
            show_timing: true,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {:?}", path))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::from_ttl_seconds(self.ttl_seconds)
            .with_max_entries(self.max_entries)
            .with_enabled(self.cache_enabled)
    }

    pub fn flight_options(&self) -> FlightOptions {
        FlightOptions::default()
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_request_timeout(self.request_timeout_secs.map(Duration::from_secs))
    }
}
