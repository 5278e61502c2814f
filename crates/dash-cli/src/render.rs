//! Terminal presentation of report results

use crate::config::Config;
use crate::reports::{ChartKind, Report};
use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, Color, Table as ComfyTable};
use dash_cache::QueryCache;
use dash_core::ResultTable;
use std::time::Instant;

/// Fetch one report through the cache and print it.
/// An empty result prints a "no data" notice instead of a table.
pub async fn render_report(
    cache: &QueryCache,
    report: &Report,
    position: usize,
    config: &Config,
) -> Result<()> {
    println!(
        "\n{} {} {}",
        format!("[{}]", position).bright_blue().bold(),
        report.title.bright_yellow().bold(),
        format!("({})", report.chart).bright_black()
    );

    let hits_before = cache.stats().hits();
    let start = Instant::now();
    let table = cache.fetch(report.sql).await?;
    let elapsed = start.elapsed();
    let from_cache = cache.stats().hits() > hits_before;

    if table.is_empty() {
        println!("{} No data for report '{}'", "⚠".bright_yellow(), report.id);
    } else {
        println!("{}", render_table(&table, config.max_rows)?);
        println!("{}", summarize(report, &table)?.bright_cyan());
    }

    if config.show_timing {
        let source = if from_cache { "cache" } else { "backend" };
        println!(
            "{} {:.2}ms from {}",
            "Time:".bright_yellow(),
            elapsed.as_secs_f64() * 1000.0,
            source
        );
    }

    Ok(())
}

/// Render every report in order. A failing report is reported and skipped.
/// Returns the number of reports that failed.
pub async fn render_dashboard(cache: &QueryCache, reports: &[Report], config: &Config) -> usize {
    let mut failures = 0;
    for (idx, report) in reports.iter().enumerate() {
        if let Err(e) = render_report(cache, report, idx + 1, config).await {
            eprintln!("{} {}: {}", "Error:".bright_red().bold(), report.id, e);
            failures += 1;
        }
    }
    failures
}

pub fn render_table(table: &ResultTable, max_rows: usize) -> Result<ComfyTable> {
    let mut out = ComfyTable::new();
    out.set_header(
        table
            .column_names()
            .into_iter()
            .map(|name| Cell::new(name).fg(Color::Cyan)),
    );

    for row in 0..table.num_rows().min(max_rows) {
        let cells: Vec<String> = table.row(row)?.iter().map(|v| v.to_string()).collect();
        out.add_row(cells);
    }

    if table.num_rows() > max_rows {
        out.add_row(vec![Cell::new(format!(
            "... {} more rows",
            table.num_rows() - max_rows
        ))
        .fg(Color::DarkGrey)]);
    }

    Ok(out)
}

/// One line describing the figure the report's chart would emphasize.
/// Missing or non-numeric measures count as zero.
pub fn summarize(report: &Report, table: &ResultTable) -> Result<String> {
    let values: Vec<f64> = table
        .numeric_column(report.measure)?
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect();

    if values.is_empty() {
        return Ok(format!("{} rows", table.num_rows()));
    }

    let summary = match report.chart {
        ChartKind::Donut => {
            let total: f64 = values.iter().sum();
            format!("Total {}: {}", report.measure, format_number(total))
        }
        ChartKind::Bubble | ChartKind::Bar => {
            let (row, max) = values
                .iter()
                .copied()
                .enumerate()
                .fold((0, f64::MIN), |best, (i, v)| if v > best.1 { (i, v) } else { best });
            let label = match table.column_names().first() {
                Some(first) => table.value(row, first)?.to_string(),
                None => String::new(),
            };
            format!("Largest {}: {} ({})", report.measure, label, format_number(max))
        }
        ChartKind::Heatmap | ChartKind::Line => {
            let min = values.iter().copied().fold(f64::MAX, f64::min);
            let max = values.iter().copied().fold(f64::MIN, f64::max);
            format!(
                "Range of {}: {} to {}",
                report.measure,
                format_number(min),
                format_number(max)
            )
        }
    };

    Ok(format!("{} rows, {}", table.num_rows(), summary))
}

/// Round to an integer and group thousands with commas
pub fn format_number(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
