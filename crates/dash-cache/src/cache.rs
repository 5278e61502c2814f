//! TTL query result cache

use crate::config::CacheConfig;
use crate::stats::CacheStats;
use ahash::RandomState;
use dash_core::{DashError, QueryBackend, Result, ResultTable};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Key for cache lookups: the query text, compared byte for byte.
///
/// No whitespace, case or SQL-level normalization is applied, so two
/// spellings of the same query are cached separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(sql: &str) -> Self {
        Self(sql.to_string())
    }
}

/// Entry stored in the cache
struct CacheEntry {
    result: ResultTable,
    created_at: Instant,
    /// Approximate size in bytes
    size_bytes: usize,
}

impl CacheEntry {
    fn new(result: ResultTable) -> Self {
        let size_bytes = result.size_bytes();
        Self {
            result,
            created_at: Instant::now(),
            size_bytes,
        }
    }

    /// Fresh while strictly younger than `ttl`
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        !self.is_fresh(ttl)
    }

    fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

struct Store {
    entries: LruCache<CacheKey, CacheEntry, RandomState>,
    memory_used: usize,
}

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Caching front for a [`QueryBackend`].
///
/// `fetch` returns the stored result for a query while it is younger than the
/// TTL and executes the query otherwise. Expiry is evaluated lazily on lookup.
/// Concurrent misses on one query share a single backend execution; misses
/// on different queries proceed independently.
pub struct QueryCache {
    store: Mutex<Store>,
    in_flight: Mutex<HashMap<CacheKey, Gate, RandomState>>,
    backend: RwLock<Option<Arc<dyn QueryBackend>>>,
    config: CacheConfig,
    stats: Arc<CacheStats>,
}

impl QueryCache {
    /// Create a cache with no backend attached
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Mutex::new(Store {
                entries: LruCache::with_hasher(capacity, RandomState::new()),
                memory_used: 0,
            }),
            in_flight: Mutex::new(HashMap::with_hasher(RandomState::new())),
            backend: RwLock::new(None),
            config,
            stats: Arc::new(CacheStats::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn with_backend(self, backend: Arc<dyn QueryBackend>) -> Self {
        self.attach_backend(backend);
        self
    }

    /// Route misses to `backend`. Cached entries are kept.
    pub fn attach_backend(&self, backend: Arc<dyn QueryBackend>) {
        info!(backend = backend.name(), "Backend attached to query cache");
        *self.backend.write() = Some(backend);
    }

    /// Drop the backend session; later misses fail with a connection error
    pub fn detach_backend(&self) -> Option<Arc<dyn QueryBackend>> {
        self.backend.write().take()
    }

    pub fn has_backend(&self) -> bool {
        self.backend.read().is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Return the result of `sql`, from cache when fresh, from the backend otherwise.
    ///
    /// # Errors
    ///
    /// - [`DashError::Connection`] when no backend is attached or the backend
    ///   has no session.
    /// - [`DashError::QueryExecution`] when the backend rejects the query.
    ///
    /// Failed executions are never stored.
    pub async fn fetch(&self, sql: &str) -> Result<ResultTable> {
        if !self.config.enabled {
            return self.execute(sql).await;
        }

        let key = CacheKey::from(sql);
        if let Some(result) = self.lookup(&key) {
            self.stats.record_hit();
            debug!(query = %short(sql), "Query cache hit");
            return Ok(result);
        }
        self.stats.record_miss();
        debug!(query = %short(sql), "Query cache miss");

        let flight = self.join_flight(&key);
        let _permit = flight.gate.lock().await;

        // Another caller may have filled the entry while we waited on the gate
        if let Some(result) = self.lookup(&key) {
            self.stats.record_coalesced();
            debug!(query = %short(sql), "Served by concurrent execution");
            return Ok(result);
        }

        let result = self.execute(sql).await?;
        self.insert(key, result.clone());
        Ok(result)
    }

    /// Execute `sql` on the backend without reading or writing the cache
    pub async fn fetch_uncached(&self, sql: &str) -> Result<ResultTable> {
        self.execute(sql).await
    }

    /// Fresh cached result for `sql`, without touching the backend
    pub fn get(&self, sql: &str) -> Option<ResultTable> {
        if !self.config.enabled {
            return None;
        }
        let result = self.lookup(&CacheKey::from(sql));
        match result {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        result
    }

    /// Remove the entry for `sql`
    pub fn invalidate(&self, sql: &str) -> bool {
        let mut guard = self.store.lock();
        let store = &mut *guard;
        let removed = match store.entries.pop(&CacheKey::from(sql)) {
            Some(entry) => {
                store.memory_used = store.memory_used.saturating_sub(entry.size_bytes);
                true
            }
            None => false,
        };
        self.publish_gauges(store);
        removed
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut guard = self.store.lock();
        let store = &mut *guard;
        store.entries.clear();
        store.memory_used = 0;
        self.publish_gauges(store);
    }

    /// Drop every entry whose age reached the TTL; returns how many were dropped
    pub fn expire_stale(&self) -> usize {
        let ttl = self.config.ttl;
        let mut guard = self.store.lock();
        let store = &mut *guard;

        let expired: Vec<CacheKey> = store
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = store.entries.pop(key) {
                store.memory_used = store.memory_used.saturating_sub(entry.size_bytes);
                self.stats.record_expiration();
            }
        }

        self.publish_gauges(store);
        expired.len()
    }

    /// Age of the entry for `sql`, fresh or not
    pub fn entry_age(&self, sql: &str) -> Option<Duration> {
        self.store
            .lock()
            .entries
            .peek(&CacheKey::from(sql))
            .map(CacheEntry::age)
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    pub fn len(&self) -> usize {
        self.store.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().entries.is_empty()
    }

    pub fn memory_used(&self) -> usize {
        self.store.lock().memory_used
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lookup(&self, key: &CacheKey) -> Option<ResultTable> {
        let ttl = self.config.ttl;
        let mut guard = self.store.lock();
        let store = &mut *guard;

        match store.entries.get(key) {
            Some(entry) if entry.is_fresh(ttl) => {
                return Some(entry.result.clone());
            }
            Some(_) => {}
            None => return None,
        }

        if let Some(stale) = store.entries.pop(key) {
            debug!(age_ms = stale.age().as_millis() as u64, "Dropping expired entry");
            store.memory_used = store.memory_used.saturating_sub(stale.size_bytes);
            self.stats.record_expiration();
            self.publish_gauges(store);
        }
        None
    }

    fn insert(&self, key: CacheKey, result: ResultTable) {
        let entry = CacheEntry::new(result);
        let size = entry.size_bytes;

        let mut guard = self.store.lock();
        let store = &mut *guard;

        if let Some((old_key, old)) = store.entries.push(key.clone(), entry) {
            store.memory_used = store.memory_used.saturating_sub(old.size_bytes);
            if old_key != key {
                debug!(query = %short(old_key.as_str()), "Evicted least recently used entry");
                self.stats.record_eviction();
            }
        }
        store.memory_used += size;

        self.publish_gauges(store);
    }

    async fn execute(&self, sql: &str) -> Result<ResultTable> {
        let backend = self.backend.read().clone().ok_or_else(|| {
            warn!("Query issued with no backend session");
            DashError::Connection("no backend session available".into())
        })?;

        self.stats.record_execution();
        let start = Instant::now();
        info!(backend = backend.name(), query = %short(sql), "Executing query");

        match backend
            .execute(sql)
            .await
            .and_then(ResultTable::from_backend)
        {
            Ok(table) => {
                debug!(
                    rows = table.num_rows(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Query executed"
                );
                Ok(table)
            }
            Err(err) => {
                self.stats.record_failure();
                warn!(error = %err, query = %short(sql), "Query execution failed");
                Err(err)
            }
        }
    }

    fn join_flight(&self, key: &CacheKey) -> InFlight<'_> {
        let gate = self
            .in_flight
            .lock()
            .entry(key.clone())
            .or_default()
            .clone();
        InFlight {
            cache: self,
            key: key.clone(),
            gate,
        }
    }

    fn publish_gauges(&self, store: &Store) {
        self.stats.set_entry_count(store.entries.len() as u64);
        self.stats.set_memory_bytes(store.memory_used as u64);
    }
}

/// Membership in the set of callers waiting on one query's execution.
/// The last member to leave removes the gate.
struct InFlight<'a> {
    cache: &'a QueryCache,
    key: CacheKey,
    gate: Gate,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.cache.in_flight.lock();
        // One reference held by the map, one by us
        if Arc::strong_count(&self.gate) == 2 {
            in_flight.remove(&self.key);
        }
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("enabled", &self.config.enabled)
            .field("ttl", &self.config.ttl)
            .field("max_entries", &self.config.max_entries)
            .field("current_entries", &self.len())
            .field("memory_used", &self.memory_used())
            .field("has_backend", &self.has_backend())
            .finish()
    }
}

/// First line of a query, for log fields
fn short(sql: &str) -> &str {
    let trimmed = sql.trim_start();
    let line = trimmed.lines().next().unwrap_or("");
    match line.char_indices().nth(80) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
    use arrow::record_batch::RecordBatch;
    use dash_core::ScalarValue;
    use dash_source::MemoryBackend;

    const TOP_TITLES: &str = "SELECT title, COUNT(*) AS cnt FROM raw.job_postings GROUP BY title";
    const BY_INDUSTRY: &str =
        "SELECT industry_id AS industry, COUNT(*) AS cnt FROM raw.job_industries GROUP BY 1";

    fn title_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("Title", DataType::Utf8, false),
            Field::new("CNT", DataType::Int64, false),
        ]))
    }

    fn title_batch(rows: &[(&str, i64)]) -> RecordBatch {
        RecordBatch::try_new(
            title_schema(),
            vec![
                Arc::new(StringArray::from(
                    rows.iter().map(|(t, _)| *t).collect::<Vec<_>>(),
                )),
                Arc::new(Int64Array::from(
                    rows.iter().map(|(_, c)| *c).collect::<Vec<_>>(),
                )),
            ],
        )
        .unwrap()
    }

    fn setup(config: CacheConfig) -> (Arc<MemoryBackend>, QueryCache) {
        let backend = Arc::new(MemoryBackend::new());
        backend.register(
            TOP_TITLES,
            title_schema(),
            vec![title_batch(&[("Data Analyst", 42), ("Nurse", 17)])],
        );
        backend.register(
            BY_INDUSTRY,
            title_schema(),
            vec![title_batch(&[("96", 300)])],
        );
        let cache = QueryCache::new(config).with_backend(backend.clone());
        (backend, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_skips_backend() {
        let (backend, cache) = setup(CacheConfig::default());

        let first = cache.fetch(TOP_TITLES).await.unwrap();
        tokio::time::advance(Duration::from_secs(599)).await;
        let second = cache.fetch(TOP_TITLES).await.unwrap();

        assert_eq!(backend.executions(TOP_TITLES), 1);
        assert_eq!(first, second);
        assert_eq!(second.column_names(), vec!["title", "cnt"]);
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_recomputed_once() {
        let (backend, cache) = setup(CacheConfig::from_ttl_seconds(600));

        cache.fetch(TOP_TITLES).await.unwrap();
        backend.register(
            TOP_TITLES,
            title_schema(),
            vec![title_batch(&[("Data Analyst", 50)])],
        );

        tokio::time::advance(Duration::from_secs(601)).await;
        let refreshed = cache.fetch(TOP_TITLES).await.unwrap();
        let again = cache.fetch(TOP_TITLES).await.unwrap();

        assert_eq!(backend.executions(TOP_TITLES), 2);
        assert_eq!(refreshed.num_rows(), 1);
        assert_eq!(refreshed.value(0, "cnt").unwrap(), ScalarValue::Int64(50));
        assert_eq!(refreshed, again);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expirations(), 1);
        assert_eq!(cache.entry_age(TOP_TITLES), Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_is_stale_at_exactly_ttl() {
        let (backend, cache) = setup(CacheConfig::from_ttl_seconds(10));

        cache.fetch(TOP_TITLES).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        cache.fetch(TOP_TITLES).await.unwrap();

        assert_eq!(backend.executions(TOP_TITLES), 2);
    }

    #[tokio::test]
    async fn test_column_names_normalized_values_unchanged() {
        let (_, cache) = setup(CacheConfig::default());

        let table = cache.fetch(TOP_TITLES).await.unwrap();

        assert_eq!(table.column_names(), vec!["title", "cnt"]);
        assert_eq!(
            table.row(0).unwrap(),
            vec![ScalarValue::Utf8("Data Analyst".into()), ScalarValue::Int64(42)]
        );
        assert_eq!(
            table.row(1).unwrap(),
            vec![ScalarValue::Utf8("Nurse".into()), ScalarValue::Int64(17)]
        );
    }

    #[tokio::test]
    async fn test_keys_are_exact_text() {
        let (backend, cache) = setup(CacheConfig::default());
        let padded = format!("{} ", TOP_TITLES);
        backend.register(
            padded.clone(),
            title_schema(),
            vec![title_batch(&[("Nurse", 17)])],
        );

        let plain = cache.fetch(TOP_TITLES).await.unwrap();
        let spaced = cache.fetch(&padded).await.unwrap();

        assert_eq!(backend.executions(TOP_TITLES), 1);
        assert_eq!(backend.executions(&padded), 1);
        assert_eq!(cache.len(), 2);
        assert_ne!(plain, spaced);
    }

    #[tokio::test]
    async fn test_empty_result_is_cached_not_an_error() {
        let (backend, cache) = setup(CacheConfig::default());
        let sql = "SELECT title, COUNT(*) AS cnt FROM raw.job_postings WHERE 1 = 0 GROUP BY 1";
        backend.register_empty(sql, title_schema());

        let table = cache.fetch(sql).await.unwrap();
        let again = cache.fetch(sql).await.unwrap();

        assert!(table.is_empty());
        assert_eq!(table.column_names(), vec!["title", "cnt"]);
        assert_eq!(table, again);
        assert_eq!(backend.executions(sql), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_are_independent() {
        let (backend, cache) = setup(CacheConfig::from_ttl_seconds(60));

        let industry = cache.fetch(BY_INDUSTRY).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        cache.fetch(TOP_TITLES).await.unwrap();
        cache.invalidate(TOP_TITLES);
        cache.fetch(TOP_TITLES).await.unwrap();

        assert_eq!(cache.entry_age(BY_INDUSTRY), Some(Duration::from_secs(30)));
        assert_eq!(cache.get(BY_INDUSTRY), Some(industry));
        assert_eq!(backend.executions(BY_INDUSTRY), 1);
        assert_eq!(backend.executions(TOP_TITLES), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_execution() {
        let backend = Arc::new(MemoryBackend::new().with_latency(Duration::from_millis(500)));
        backend.register(
            TOP_TITLES,
            title_schema(),
            vec![title_batch(&[("Data Analyst", 42)])],
        );
        let cache = Arc::new(QueryCache::with_defaults().with_backend(backend.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.fetch(TOP_TITLES).await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        for result in results {
            assert_eq!(result.unwrap().unwrap().num_rows(), 1);
        }

        assert_eq!(backend.executions(TOP_TITLES), 1);
        assert_eq!(cache.stats().executions(), 1);
        assert_eq!(cache.stats().coalesced(), 7);
        assert!(cache.in_flight.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_execution_is_not_cached() {
        let (backend, cache) = setup(CacheConfig::default());
        let sql = "SELECT bogus FROM raw.job_postings";
        backend.fail_query(sql, "SQL compilation error: invalid identifier 'BOGUS'");

        let err = cache.fetch(sql).await.unwrap_err();
        assert!(err.is_query_execution());
        assert!(err.to_string().contains("invalid identifier"));
        assert!(cache.is_empty());

        backend.register_empty(sql, title_schema());
        assert!(cache.fetch(sql).await.is_ok());
        assert_eq!(backend.executions(sql), 2);
        assert_eq!(cache.stats().failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_after_expiry_leaves_key_absent() {
        let (backend, cache) = setup(CacheConfig::from_ttl_seconds(60));

        cache.fetch(TOP_TITLES).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        backend.fail_query(TOP_TITLES, "warehouse is resizing");

        let err = cache.fetch(TOP_TITLES).await.unwrap_err();
        assert!(err.is_query_execution());
        assert!(cache.is_empty());
        assert_eq!(cache.entry_age(TOP_TITLES), None);
        assert!(cache.get(TOP_TITLES).is_none());
        assert_eq!(cache.stats().expirations(), 1);
        assert_eq!(cache.stats().failures(), 1);
    }

    #[tokio::test]
    async fn test_connection_errors() {
        let cache = QueryCache::with_defaults();
        let err = cache.fetch(TOP_TITLES).await.unwrap_err();
        assert!(err.is_connection());

        let (backend, cache) = setup(CacheConfig::default());
        backend.set_online(false);
        let err = cache.fetch(TOP_TITLES).await.unwrap_err();
        assert!(err.is_connection());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cached_results_survive_detach() {
        let (_, cache) = setup(CacheConfig::default());
        cache.fetch(TOP_TITLES).await.unwrap();

        assert!(cache.detach_backend().is_some());
        assert!(!cache.has_backend());
        assert!(cache.fetch(TOP_TITLES).await.is_ok());
        assert!(cache.fetch(BY_INDUSTRY).await.unwrap_err().is_connection());
    }

    #[tokio::test]
    async fn test_disabled_cache_always_executes() {
        let (backend, cache) = setup(CacheConfig::disabled());

        let table = cache.fetch(TOP_TITLES).await.unwrap();
        cache.fetch(TOP_TITLES).await.unwrap();

        assert_eq!(table.column_names(), vec!["title", "cnt"]);
        assert_eq!(backend.executions(TOP_TITLES), 2);
        assert!(cache.is_empty());
        assert!(cache.get(TOP_TITLES).is_none());
    }

    #[tokio::test]
    async fn test_fetch_uncached_leaves_store_alone() {
        let (backend, cache) = setup(CacheConfig::default());

        cache.fetch_uncached(TOP_TITLES).await.unwrap();

        assert!(cache.is_empty());
        assert_eq!(backend.executions(TOP_TITLES), 1);
    }

    #[tokio::test]
    async fn test_least_recently_used_entry_evicted() {
        let (backend, cache) = setup(CacheConfig::default().with_max_entries(2));
        let third = "SELECT 3";
        backend.register_empty(third, title_schema());

        cache.fetch(TOP_TITLES).await.unwrap();
        cache.fetch(BY_INDUSTRY).await.unwrap();
        cache.fetch(TOP_TITLES).await.unwrap();
        cache.fetch(third).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions(), 1);
        assert!(cache.entry_age(BY_INDUSTRY).is_none());

        cache.fetch(TOP_TITLES).await.unwrap();
        assert_eq!(backend.executions(TOP_TITLES), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_stale() {
        let (_, cache) = setup(CacheConfig::from_ttl_seconds(60));

        cache.fetch(TOP_TITLES).await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.fetch(BY_INDUSTRY).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(cache.expire_stale(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.entry_age(BY_INDUSTRY).is_some());
        assert_eq!(cache.stats().entry_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_tracking_and_clear() {
        let (_, cache) = setup(CacheConfig::default());
        assert_eq!(cache.memory_used(), 0);

        cache.fetch(TOP_TITLES).await.unwrap();
        cache.fetch(BY_INDUSTRY).await.unwrap();
        assert!(cache.memory_used() > 0);
        assert_eq!(cache.stats().memory_bytes(), cache.memory_used() as u64);

        assert!(cache.invalidate(TOP_TITLES));
        assert!(!cache.invalidate(TOP_TITLES));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.memory_used(), 0);
        assert_eq!(cache.stats().entry_count(), 0);
    }

    #[test]
    fn test_short_query_label() {
        assert_eq!(short("\n  SELECT 1\n  FROM t"), "SELECT 1");
        assert_eq!(short(&"x".repeat(200)).len(), 80);
    }
}
