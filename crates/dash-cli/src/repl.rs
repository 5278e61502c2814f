use crate::commands::{list_reports, print_cache_stats};
use crate::config::Config;
use crate::render::{render_dashboard, render_report, render_table};
use crate::reports::{self, REPORTS};
use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{Cell, Color, Table as ComfyTable};
use dash_cache::QueryCache;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

pub struct Repl {
    config: Config,
    editor: DefaultEditor,
    cache: Arc<QueryCache>,
    history_file: PathBuf,
}

impl Repl {
    pub fn new(config: Config, cache: Arc<QueryCache>) -> Result<Self> {
        let history_file = Self::get_history_file()?;
        let mut editor = DefaultEditor::new()?;

        let _ = editor.load_history(&history_file);

        Ok(Self {
            config,
            editor,
            cache,
            history_file,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("{}", "Interactive Dashboard REPL".bright_green().bold());
        println!("  {}  - Show available commands", ".help".bright_cyan());
        println!("  {}  - Render every report", ".run all".bright_cyan());
        println!("  {}  - Exit the REPL", ".quit".bright_cyan());
        println!("  Any other line is sent as SQL through the query cache");
        println!();

        loop {
            let prompt = format!("{} ", "jobdash>".bright_green().bold());
            let readline = self.editor.readline(&prompt);

            match readline {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    self.editor.add_history_entry(line.as_str())?;

                    match self.handle_input(&line).await {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => eprintln!("{} {:#}", "Error:".bright_red().bold(), e),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".bright_yellow());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "exit".bright_yellow());
                    break;
                }
                Err(err) => {
                    eprintln!("{} {:?}", "Error:".bright_red().bold(), err);
                    break;
                }
            }
        }

        if let Err(e) = self.editor.save_history(&self.history_file) {
            eprintln!("{} Failed to save history: {}", "Warning:".bright_yellow(), e);
        }

        Ok(())
    }

    /// Returns `true` when the REPL should exit
    async fn handle_input(&mut self, input: &str) -> Result<bool> {
        if is_command(input) {
            self.handle_command(input.trim()).await
        } else {
            self.handle_sql(input).await?;
            Ok(false)
        }
    }

    async fn handle_command(&mut self, cmd: &str) -> Result<bool> {
        let (name, arg) = match cmd.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (cmd, ""),
        };

        match name {
            ".quit" | ".q" | ".exit" => return Ok(true),
            ".help" | ".h" => self.show_help(),
            ".reports" => list_reports(),
            ".run" => {
                if arg.is_empty() || arg == "all" {
                    let failures = render_dashboard(&self.cache, &REPORTS, &self.config).await;
                    if failures > 0 {
                        println!("{} {} report(s) failed", "⚠".bright_yellow(), failures);
                    }
                } else {
                    let position = REPORTS
                        .iter()
                        .position(|r| r.id.eq_ignore_ascii_case(arg))
                        .with_context(|| format!("Unknown report '{}'. Try .reports", arg))?;
                    render_report(&self.cache, &REPORTS[position], position + 1, &self.config)
                        .await?;
                }
            }
            ".cache" => match arg {
                "" | "stats" => print_cache_stats(&self.cache),
                "clear" => {
                    self.cache.clear();
                    println!("{} Cache cleared", "✓".bright_green());
                }
                "expire" => {
                    let expired = self.cache.expire_stale();
                    println!("{} Dropped {} expired entr(ies)", "✓".bright_green(), expired);
                }
                _ => anyhow::bail!("Unknown cache command. Use: stats, clear, expire"),
            },
            ".invalidate" => {
                if arg.is_empty() {
                    anyhow::bail!("Usage: .invalidate <report-id | sql>");
                }
                let sql = reports::find(arg).map(|r| r.sql).unwrap_or(arg);
                if self.cache.invalidate(sql) {
                    println!("{} Entry removed", "✓".bright_green());
                } else {
                    println!("{}", "No cached entry for that query".bright_yellow());
                }
            }
            ".timing" => {
                self.config.show_timing = !self.config.show_timing;
                println!(
                    "Timing is {}",
                    if self.config.show_timing { "on" } else { "off" }
                );
            }
            _ => anyhow::bail!("Unknown command '{}'. Type .help for commands", name),
        }

        Ok(false)
    }

    async fn handle_sql(&mut self, sql: &str) -> Result<()> {
        run_sql(&self.cache, &self.config, sql).await
    }

    fn show_help(&self) {
        let mut table = ComfyTable::new();
        table.set_header(vec![
            Cell::new("Command").fg(Color::Cyan),
            Cell::new("Description").fg(Color::Yellow),
        ]);

        let commands = vec![
            (".help, .h", "Show this help message"),
            (".quit, .q, .exit", "Exit the REPL"),
            (".reports", "List the dashboard reports"),
            (".run <id|all>", "Render one report or the whole dashboard"),
            (".cache [stats|clear|expire]", "Show cache stats, clear, or drop expired entries"),
            (".invalidate <id|sql>", "Forget the cached result of one query"),
            (".timing", "Toggle timing display"),
        ];

        for (cmd, desc) in commands {
            table.add_row(vec![cmd, desc]);
        }

        println!("{}", table);
        println!();
        println!(
            "{}",
            "SQL is matched against the cache by exact text; edit a query to force a new execution."
                .bright_black()
        );
    }

    fn get_history_file() -> Result<PathBuf> {
        let home = home::home_dir().context("Could not find home directory")?;
        let history_dir = home.join(".jobdash");
        std::fs::create_dir_all(&history_dir)?;
        Ok(history_dir.join("history.txt"))
    }
}

async fn run_sql(cache: &QueryCache, config: &Config, sql: &str) -> Result<()> {
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

    Ok(())
}

/// Dot commands may carry surrounding whitespace; SQL is passed on verbatim
fn is_command(input: &str) -> bool {
    input.trim_start().starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use dash_cache::CacheConfig;
    use dash_source::MemoryBackend;

    #[tokio::test]
    async fn test_sql_reaches_cache_verbatim() {
        let sql = "SELECT COUNT(*) AS cnt FROM raw.job_postings ";
        let schema = Arc::new(Schema::new(vec![Field::new("CNT", DataType::Int64, false)]));
        let batch =
            RecordBatch::try_new(schema.clone(), vec![Arc::new(Int64Array::from(vec![1200]))])
                .unwrap();
        let backend = Arc::new(MemoryBackend::new());
        backend.register(sql, schema, vec![batch]);
        let cache = QueryCache::new(CacheConfig::default()).with_backend(backend.clone());

        run_sql(&cache, &Config::default(), sql).await.unwrap();

        assert_eq!(backend.executions(sql), 1);
        assert!(cache.get(sql).is_some());
        assert!(cache.get(sql.trim_end()).is_none());
    }

    #[test]
    fn test_dot_commands_detected_through_whitespace() {
        assert!(is_command(".run all"));
        assert!(is_command("  .cache stats  "));
        assert!(!is_command("SELECT 1"));
        assert!(!is_command("  SELECT 1 "));
    }
}
