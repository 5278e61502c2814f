//! Query result cache for the job postings dashboard
//!
//! Sits between report code and the analytical store. Each distinct query
//! string maps to at most one cached [`ResultTable`](dash_core::ResultTable);
//! an entry is reused while younger than the configured TTL and recomputed
//! lazily on the first fetch after that.
//!
//! # Example
//!
//! ```ignore
//! use dash_cache::{CacheConfig, QueryCache};
//! use std::sync::Arc;
//!
//! let cache = QueryCache::new(CacheConfig::from_ttl_seconds(600))
//!     .with_backend(Arc::new(backend));
//!
//! let table = cache.fetch("SELECT industry_id AS industry, COUNT(*) AS cnt ...").await?;
//! if table.is_empty() {
//!     println!("no data");
//! }
//! ```

pub mod cache;
pub mod config;
pub mod stats;

pub use cache::{CacheKey, QueryCache};
pub use config::{CacheConfig, DEFAULT_TTL_SECS};
pub use stats::CacheStats;
