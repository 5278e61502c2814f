//! Cache statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing how the cache has served fetches
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Fetches answered from a fresh entry
    hits: AtomicU64,
    /// Fetches that found no fresh entry
    misses: AtomicU64,
    /// Entries dropped because their age reached the TTL
    expirations: AtomicU64,
    /// Entries dropped to respect `max_entries`
    evictions: AtomicU64,
    /// Queries sent to the backend
    executions: AtomicU64,
    /// Backend executions that returned an error
    failures: AtomicU64,
    /// Misses served by another caller's in-flight execution
    coalesced: AtomicU64,
    /// Current number of entries
    entry_count: AtomicU64,
    /// Approximate memory held by cached results
    memory_bytes: AtomicU64,
}

impl CacheStats {
    /// Create zeroed statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a fetch served from a fresh entry
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a fetch that found no fresh entry
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an entry dropped for reaching the TTL
    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an entry dropped by the capacity bound
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a query sent to the backend
    pub fn record_execution(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a backend execution that returned an error
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a miss answered by a concurrent execution
    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the number of stored entries
    pub fn set_entry_count(&self, count: u64) {
        self.entry_count.store(count, Ordering::Relaxed);
    }

    /// Update the approximate memory held by entries
    pub fn set_memory_bytes(&self, bytes: u64) {
        self.memory_bytes.store(bytes, Ordering::Relaxed);
    }

    /// Get hit count
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get miss count
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get expiration count
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// Get eviction count
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get backend execution count
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Get failed execution count
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Get coalesced fetch count
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    /// Get current entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    /// Get approximate memory usage in bytes
    pub fn memory_bytes(&self) -> u64 {
        self.memory_bytes.load(Ordering::Relaxed)
    }

    /// Share of lookups answered from cache (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Total lookups, hits plus misses
    pub fn total_requests(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Reset the event counters. Entry count and memory are gauges and stay.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.executions.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.coalesced.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_recording() {
        let stats = CacheStats::new();

        stats.record_hit();
        stats.record_miss();
        stats.record_miss();
        stats.record_execution();
        stats.record_coalesced();

        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.misses(), 2);
        assert_eq!(stats.executions(), 1);
        assert_eq!(stats.coalesced(), 1);
        assert_eq!(stats.total_requests(), 3);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);

        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();

        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset_keeps_gauges() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_failure();
        stats.set_entry_count(4);

        stats.reset();

        assert_eq!(stats.hits(), 0);
        assert_eq!(stats.failures(), 0);
        assert_eq!(stats.entry_count(), 4);
    }
}
