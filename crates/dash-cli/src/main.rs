use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use dash_cache::QueryCache;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod render;
mod reports;
mod repl;

use commands::*;
use config::Config;
use repl::Repl;

#[derive(Parser)]
#[command(name = "jobdash")]
#[command(author, version, about = "Job postings dashboard - cached KPI reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Arrow Flight endpoint of the analytical store
    #[arg(long, global = true)]
    connect: Option<String>,

    /// Serve reports from <dir>/<report-id>.csv instead of a live store
    #[arg(long, global = true, conflicts_with = "connect")]
    offline: Option<PathBuf>,

    /// Cache time-to-live in seconds
    #[arg(long, global = true)]
    ttl: Option<u64>,

    /// Disable result caching
    #[arg(long, global = true)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every report
    Dashboard {
        /// Number of consecutive renders
        #[arg(short, long, default_value = "1")]
        rounds: usize,

        /// Seconds to wait between renders
        #[arg(short, long, default_value = "0")]
        interval: u64,
    },

    /// Fetch a single SQL query through the cache
    Query {
        /// SQL query to execute
        #[arg(short, long)]
        sql: String,

        /// Number of times to fetch it
        #[arg(short, long, default_value = "1")]
        repeat: usize,
    },

    /// List the report definitions
    Reports,

    /// Write the effective configuration to a JSON file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },

    /// Start interactive REPL
    Repl,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };
    if let Some(ttl) = cli.ttl {
        config.ttl_seconds = ttl;
    }
    if cli.no_cache {
        config.cache_enabled = false;
    }

    print_banner();

    match &cli.command {
        Some(Commands::Reports) => {
            list_reports();
            return Ok(());
        }
        Some(Commands::InitConfig { path }) => {
            config.save(path)?;
            println!("{} Configuration written to {:?}", "✓".bright_green(), path);
            return Ok(());
        }
        _ => {}
    }

    let backend = connect_backend(&config, cli.connect.as_deref(), cli.offline.as_deref()).await?;
    let cache = Arc::new(QueryCache::new(config.cache_config()).with_backend(backend));

    match cli.command {
        Some(Commands::Dashboard { rounds, interval }) => {
            run_dashboard(&config, &cache, rounds, Duration::from_secs(interval)).await?;
        }
        Some(Commands::Query { sql, repeat }) => {
            run_query(&config, &cache, &sql, repeat).await?;
        }
        Some(Commands::Repl) => {
            let mut repl = Repl::new(config, cache)?;
            repl.run().await?;
        }
        Some(Commands::Reports) | Some(Commands::InitConfig { .. }) => {}
        None => {
            run_dashboard(&config, &cache, 1, Duration::ZERO).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        "jobdash=debug,dash_cache=debug,dash_source=debug"
    } else {
        "jobdash=info,dash_cache=warn,dash_source=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
      _       _         _           _
     (_) ___ | |__   __| | __ _ ___| |__
     | |/ _ \| '_ \ / _` |/ _` / __| '_ \
     | | (_) | |_) | (_| | (_| \__ \ | | |
    _/ |\___/|_.__/ \__,_|\__,_|___/_| |_|
   |__/
    "#
        .bright_cyan()
    );
    println!(
        "{}",
        "LinkedIn Job Postings Dashboard v0.1.0".bright_yellow()
    );
}
