//! Cached Fetch Example
//!
//! Serves one report query from a slow in-memory backend through the query
//! cache and shows hits, expiry and recomputation.

use anyhow::Result;
use dash_cache::{CacheConfig, QueryCache};
use dash_demos::work_type_counts;
use dash_source::MemoryBackend;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WORK_TYPES: &str = "SELECT formatted_work_type AS work_type, COUNT(*) AS cnt \
                          FROM raw.job_postings GROUP BY formatted_work_type ORDER BY cnt DESC";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("dash_cache=debug")
        .init();

    println!("=== Cached Fetch Example ===\n");

    let backend = Arc::new(MemoryBackend::new().with_latency(Duration::from_millis(300)));
    backend.register_result(WORK_TYPES, work_type_counts()?);

    let ttl = Duration::from_secs(2);
    let cache = QueryCache::new(CacheConfig::default().with_ttl(ttl)).with_backend(backend.clone());

    for attempt in 1..=3 {
        let start = Instant::now();
        let table = cache.fetch(WORK_TYPES).await?;
        println!(
            "Fetch {}: {} rows, columns {:?}, {:.1}ms",
            attempt,
            table.num_rows(),
            table.column_names(),
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    println!("\nWaiting {:?} for the entry to expire...\n", ttl);
    tokio::time::sleep(ttl).await;

    let start = Instant::now();
    cache.fetch(WORK_TYPES).await?;
    println!(
        "Fetch after expiry: {:.1}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );

    let stats = cache.stats();
    println!("\nBackend executions: {}", backend.total_executions());
    println!("Hits: {}  Misses: {}  Expirations: {}", stats.hits(), stats.misses(), stats.expirations());
    println!("Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    println!("\n=== Done ===");
    Ok(())
}
