//! NEPSE CLI: screener merge, snapshot cache and upstream refresh commands.
//!
//! Commands:
//! - `merge`: build the merged screener table (trading + dividends + fundamentals)
//! - `snapshot refresh`: fetch the live trading snapshot into the cache
//! - `snapshot status`: report cache age and whether it is still fresh
//! - `sort-dividends`: sort a dividend CSV by symbol, newest fiscal year first
//! - `scrape-fundamentals`: EPS and book value per traded symbol, as `eps.csv`
//! - `trigger`: dispatch the upstream data refresh workflows

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use nepse_core::dividends::sort_table;
use nepse_core::fundamentals::records_to_table;
use nepse_core::{parse, CacheStore, FileStore, OutputSchema, SourceKind, Table};
use nepse_runner::{
    symbols_from_snapshot, FundamentalsScraper, MergedTable, Pipeline, PipelineConfig,
    WorkflowTrigger, NOT_AVAILABLE,
};

#[derive(Parser)]
#[command(
    name = "nepse",
    about = "NEPSE dividend screener: live prices merged with dividend history"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Offline mode: no network access.
    #[arg(long, global = true, default_value_t = false)]
    offline: bool,

    /// Increase log verbosity (-v debug, -vv trace). Overrides RUST_LOG.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the merged screener table.
    Merge {
        /// Column layout: basic (5 columns) or extended (8 columns).
        #[arg(long)]
        schema: Option<OutputSchema>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Trading cache file (overrides config).
        #[arg(long)]
        cache_path: Option<PathBuf>,

        /// Ignore a fresh cache and fetch the trading snapshot again.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Trading snapshot cache commands.
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
    /// Sort a dividend CSV by Symbol ascending, then Fiscal Year descending.
    SortDividends {
        /// Input CSV.
        input: PathBuf,

        /// Output CSV. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Scrape EPS and book value for every symbol in the trading cache.
    ScrapeFundamentals {
        /// Output CSV. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Concurrent page fetches (overrides config).
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Dispatch upstream refresh workflows (at most once per cooldown window each).
    Trigger {
        /// Workflow file names. Defaults to the configured workflow.
        workflows: Vec<String>,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Fetch the live trading snapshot into the cache.
    Refresh {
        /// Fetch even if the cached snapshot is still fresh.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Report the cached snapshot's age and freshness.
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Aligned columns for the terminal.
    Table,
    Csv,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = PipelineConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;
    config.offline |= cli.offline;

    match cli.command {
        Commands::Merge {
            schema,
            format,
            output,
            cache_path,
            force,
        } => {
            if let Some(schema) = schema {
                config.schema = schema;
            }
            if let Some(path) = cache_path {
                config.trading.cache_path = path;
            }
            run_merge(&config, force, format, output.as_deref())
        }
        Commands::Snapshot { action } => match action {
            SnapshotAction::Refresh { force } => run_snapshot_refresh(&config, force),
            SnapshotAction::Status => run_snapshot_status(&config),
        },
        Commands::SortDividends { input, output } => run_sort_dividends(&input, output.as_deref()),
        Commands::ScrapeFundamentals { output, workers } => {
            if let Some(workers) = workers {
                config.company_pages.workers = workers;
            }
            run_scrape_fundamentals(&config, output.as_deref())
        }
        Commands::Trigger { workflows } => run_trigger(&config, workflows),
    }
}

/// Logs go to stderr so stdout carries only the table.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_merge(config: &PipelineConfig, force: bool, format: Format, output: Option<&Path>) -> Result<()> {
    let pipeline = Pipeline::from_config(config, force).context("failed to set up pipeline")?;
    let merged = pipeline.run(Utc::now()).context("merge failed")?;

    let mut out = open_output(output)?;
    match format {
        Format::Table => write_aligned(&mut out, &merged.table)?,
        Format::Csv => write_csv(&mut out, &merged.table)?,
        Format::Json => write_json(&mut out, &merged)?,
    }
    out.flush()?;

    if let Some(path) = output {
        info!(path = %path.display(), rows = merged.table.data_len(), "merged table written");
    }
    Ok(())
}

fn run_snapshot_refresh(config: &PipelineConfig, force: bool) -> Result<()> {
    let pipeline = Pipeline::from_config(config, force).context("failed to set up pipeline")?;
    let snapshot = pipeline
        .snapshot()
        .load(Utc::now())
        .context("snapshot refresh failed")?;

    println!(
        "{} rows, as of {} ({:?})",
        snapshot.envelope.data.data_len(),
        snapshot.envelope.timestamp.to_rfc3339(),
        snapshot.origin
    );
    Ok(())
}

fn run_snapshot_status(config: &PipelineConfig) -> Result<()> {
    let pipeline = Pipeline::from_config(config, false).context("failed to set up pipeline")?;
    let now = Utc::now();

    let Some(status) = pipeline.snapshot().status(now) else {
        println!("No cached snapshot at {}", config.trading.cache_path.display());
        return Ok(());
    };

    println!("Cache:     {}", config.trading.cache_path.display());
    println!("As of:     {}", status.timestamp.to_rfc3339());
    println!("Rows:      {}", status.rows);
    println!("Age:       {} min", status.age_minutes);
    println!(
        "Market:    {:?} (max age {} min)",
        status.session, status.threshold_minutes
    );
    match pipeline.snapshot().remaining(now) {
        Some(left) => println!("Status:    fresh ({} min left)", left.num_minutes()),
        None => println!("Status:    stale"),
    }
    Ok(())
}

fn run_sort_dividends(input: &Path, output: Option<&Path>) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    let mut table = parse(&text, SourceKind::Delimited)
        .with_context(|| format!("cannot parse {}", input.display()))?;
    sort_table(&mut table)?;

    let mut out = open_output(output)?;
    write_csv(&mut out, &table)?;
    out.flush()?;
    Ok(())
}

fn run_scrape_fundamentals(config: &PipelineConfig, output: Option<&Path>) -> Result<()> {
    if config.offline {
        bail!("cannot scrape company pages in offline mode");
    }

    let cache_path = &config.trading.cache_path;
    let Some(snapshot) = FileStore::new(cache_path)
        .read()
        .with_context(|| format!("cannot read trading cache {}", cache_path.display()))?
    else {
        bail!(
            "no cached trading snapshot at {}; run `nepse snapshot refresh` first",
            cache_path.display()
        );
    };

    let symbols = symbols_from_snapshot(&snapshot);
    let scraper = FundamentalsScraper::from_config(&config.company_pages, &config.http)?;
    let records = scraper.scrape(&symbols)?;

    let mut out = open_output(output)?;
    write_csv(&mut out, &records_to_table(&records))?;
    out.flush()?;

    let missing = records.iter().filter(|r| r.eps == NOT_AVAILABLE).count();
    info!(rows = records.len(), missing_eps = missing, "fundamentals scraped");
    Ok(())
}

fn run_trigger(config: &PipelineConfig, workflows: Vec<String>) -> Result<()> {
    if config.offline {
        bail!("cannot dispatch workflows in offline mode");
    }

    let workflows = if workflows.is_empty() {
        vec![config.trigger.default_workflow.clone()]
    } else {
        workflows
    };

    let trigger = WorkflowTrigger::from_config(&config.trigger, &config.http)?;
    let outcomes = trigger.trigger_all(&workflows, Utc::now());

    let mut failed = 0;
    for (workflow, outcome) in &outcomes {
        match outcome {
            Ok(()) => println!("{workflow}: dispatched"),
            Err(e) => {
                failed += 1;
                eprintln!("{workflow}: {e}");
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} workflow(s) not dispatched", outcomes.len());
    }
    Ok(())
}

// ── Output ───────────────────────────────────────────────────────────

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(p).with_context(|| format!("cannot create {}", p.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    })
}

fn write_csv(out: &mut dyn Write, table: &Table) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out);
    for row in table.rows() {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json(out: &mut dyn Write, merged: &MergedTable) -> Result<()> {
    let body = serde_json::json!({
        "timestamp": merged.snapshot_at,
        "origin": merged.origin,
        "data": merged.table,
    });
    serde_json::to_writer_pretty(&mut *out, &body)?;
    writeln!(out)?;
    Ok(())
}

fn write_aligned(out: &mut dyn Write, table: &Table) -> Result<()> {
    if table.is_empty() {
        writeln!(out, "(no trading data)")?;
        return Ok(());
    }

    let columns = table.rows().iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in table.rows() {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    for (n, row) in table.rows().iter().enumerate() {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                // Symbol left-aligned, numbers right-aligned.
                if i == 0 {
                    format!("{cell:<w$}", w = widths[i])
                } else {
                    format!("{cell:>w$}", w = widths[i])
                }
            })
            .collect();
        writeln!(out, "{}", line.join("  ").trim_end())?;
        if n == 0 {
            let total = widths.iter().sum::<usize>() + 2 * columns.saturating_sub(1);
            writeln!(out, "{}", "-".repeat(total))?;
        }
    }
    Ok(())
}
