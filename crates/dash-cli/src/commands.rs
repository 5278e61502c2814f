use crate::config::Config;
use crate::render::{render_dashboard, render_table};
use crate::reports::REPORTS;
use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{Cell, Color, Table as ComfyTable};
use dash_cache::QueryCache;
use dash_core::QueryBackend;
use dash_source::{FlightBackend, MemoryBackend};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Open the backing store session: CSV fixtures when `offline` is given,
/// otherwise the Flight endpoint from the command line or the config file.
pub async fn connect_backend(
    config: &Config,
    endpoint: Option<&str>,
    offline: Option<&Path>,
) -> Result<Arc<dyn QueryBackend>> {
    if let Some(dir) = offline {
        return Ok(Arc::new(load_fixtures(dir)?));
    }

    let endpoint = endpoint
        .or(config.endpoint.as_deref())
        .context("No backend configured: pass --connect <url>, --offline <dir>, or set \"endpoint\" in the config file")?;

    println!("{} Connecting to {}", "→".bright_blue(), endpoint.bright_cyan());
    let backend = FlightBackend::connect_with_options(endpoint, config.flight_options())
        .await
        .with_context(|| format!("Failed to connect to {}", endpoint))?;

    Ok(Arc::new(backend))
}

/// Register `<dir>/<report-id>.csv` as the result of each report query.
/// Reports without a fixture fail when fetched.
pub fn load_fixtures(dir: &Path) -> Result<MemoryBackend> {
    if !dir.is_dir() {
        anyhow::bail!("Fixture directory not found: {:?}", dir);
    }

    let backend = MemoryBackend::new();
    for report in &REPORTS {
        let path = dir.join(format!("{}.csv", report.id));
        if !path.exists() {
            warn!("No fixture for report '{}' at {:?}", report.id, path);
            continue;
        }
        backend
            .register_csv(report.sql, &path)
            .with_context(|| format!("Failed to load fixture {:?}", path))?;
    }

    println!(
        "{} Loaded {} fixture(s) from {:?}",
        "✓".bright_green(),
        backend.registered_queries(),
        dir
    );
    Ok(backend)
}

pub async fn run_dashboard(
    config: &Config,
    cache: &QueryCache,
    rounds: usize,
    interval: Duration,
) -> Result<()> {
    let rounds = rounds.max(1);
    let mut failures = 0;

    for round in 1..=rounds {
        if rounds > 1 {
            println!(
                "\n{}",
                format!("=== Render {} of {} ===", round, rounds).bright_magenta().bold()
            );
        }
        failures += render_dashboard(cache, &REPORTS, config).await;

        if round < rounds && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }

    println!();
    print_cache_stats(cache);

    if failures > 0 {
        anyhow::bail!("{} report render(s) failed", failures);
    }
    Ok(())
}

pub async fn run_query(config: &Config, cache: &QueryCache, sql: &str, repeat: usize) -> Result<()> {
    for _ in 0..repeat.max(1) {
        let start = Instant::now();
        let table = cache.fetch(sql).await?;
        let elapsed = start.elapsed();

        if table.is_empty() {
            println!("{} Query returned no rows", "⚠".bright_yellow());
        } else {
            println!("{}", render_table(&table, config.max_rows)?);
            println!("{} row(s)", table.num_rows());
        }

        if config.show_timing {
            println!(
                "{} {:.2}ms",
                "Time:".bright_yellow(),
                elapsed.as_secs_f64() * 1000.0
            );
        }
    }

    print_cache_stats(cache);
    Ok(())
}

pub fn list_reports() {
    let mut table = ComfyTable::new();
    table.set_header(vec![
        Cell::new("Id").fg(Color::Cyan),
        Cell::new("Chart").fg(Color::Yellow),
        Cell::new("Measure").fg(Color::Green),
        Cell::new("Title").fg(Color::Magenta),
    ]);

    for report in &REPORTS {
        table.add_row(vec![
            report.id.to_string(),
            report.chart.to_string(),
            report.measure.to_string(),
            report.title.to_string(),
        ]);
    }

    println!("{}", table);
}

pub fn print_cache_stats(cache: &QueryCache) {
    let stats = cache.stats();

    println!("{}", "Query Cache Statistics".bright_yellow().bold());

    let mut table = ComfyTable::new();
    table.set_header(vec![
        Cell::new("Metric").fg(Color::Cyan),
        Cell::new("Value").fg(Color::Green),
    ]);

    table.add_row(vec![
        "Enabled",
        if cache.is_enabled() { "Yes" } else { "No" },
    ]);
    table.add_row(vec!["TTL", &format!("{}s", cache.config().ttl.as_secs())]);
    table.add_row(vec!["Entries", &stats.entry_count().to_string()]);
    table.add_row(vec![
        "Memory Used",
        &format!("{} bytes", stats.memory_bytes()),
    ]);
    table.add_row(vec!["Hits", &stats.hits().to_string()]);
    table.add_row(vec!["Misses", &stats.misses().to_string()]);
    table.add_row(vec![
        "Hit Rate",
        &format!("{:.1}%", stats.hit_rate() * 100.0),
    ]);
    table.add_row(vec!["Backend Executions", &stats.executions().to_string()]);
    table.add_row(vec!["Failed Executions", &stats.failures().to_string()]);
    table.add_row(vec!["Coalesced", &stats.coalesced().to_string()]);
    table.add_row(vec!["Expirations", &stats.expirations().to_string()]);
    table.add_row(vec!["Evictions", &stats.evictions().to_string()]);

    println!("{}", table);
}
