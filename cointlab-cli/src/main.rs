//! CointLab CLI — ingest, run, export, and status commands.
//!
//! Commands:
//! - `ingest` — load kline JSON files into the SQLite market table (and optionally the Parquet cache)
//! - `run` — compute and persist new rolling cointegration p-values
//! - `export` — write stored p-values for one window size to CSV
//! - `status` — report row counts and date ranges per table and cached symbols

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cointlab_core::data::{load_kline_file, PanelSource, ParquetCache};
use cointlab_core::domain::{MarketBar, SymbolPair};
use cointlab_runner::{
    handle_event, save_records_csv, Collaborators, InvocationEvent, MemoryStore, ResultSink,
    RunConfig, SqliteStore, SyntheticPanel,
};

#[derive(Parser)]
#[command(
    name = "cointlab",
    about = "CointLab CLI — rolling pairwise cointegration engine"
)]
struct Cli {
    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load kline JSON files (one per symbol, named SYMBOL.json) into the database.
    Ingest {
        /// Files or directories containing *.json kline files.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// SQLite database path.
        #[arg(long, default_value = "cointlab.db")]
        db: PathBuf,

        /// Also write the bars to this Parquet cache directory.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Compute new rolling p-values for group1 × group2.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// First symbol group, comma separated.
        #[arg(long, value_delimiter = ',')]
        group1: Option<Vec<String>>,

        /// Second symbol group, comma separated.
        #[arg(long, value_delimiter = ',')]
        group2: Option<Vec<String>>,

        /// Rolling window in observations.
        #[arg(long)]
        window_size: Option<usize>,

        /// SQLite database path (overrides the config).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Read closes from this Parquet cache instead of the database.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Use deterministic synthetic closes. Implies --dry-run.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Worker threads; 0 means one per core.
        #[arg(long)]
        threads: Option<usize>,

        /// Stop starting new pairs after this many seconds.
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Compute without writing results.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Export stored p-values for one window size to CSV.
    Export {
        #[arg(long, default_value = "cointlab.db")]
        db: PathBuf,

        #[arg(long)]
        window_size: usize,

        /// Restrict to these pairs (A:B). Repeatable.
        #[arg(long = "pair")]
        pairs: Vec<String>,

        #[arg(long)]
        out: PathBuf,
    },
    /// Report row counts and date ranges per table, and optionally the Parquet cache.
    Status {
        #[arg(long, default_value = "cointlab.db")]
        db: PathBuf,

        /// Also report per-symbol coverage of this Parquet cache.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Ingest {
            paths,
            db,
            cache_dir,
        } => run_ingest(&paths, &db, cache_dir.as_deref()),
        Commands::Run {
            config,
            group1,
            group2,
            window_size,
            db,
            cache_dir,
            synthetic,
            threads,
            deadline_secs,
            dry_run,
        } => {
            let mut run_config = match config {
                Some(path) => RunConfig::from_file(&path)?,
                None => RunConfig::default(),
            };
            if group1.is_some() {
                run_config.groups.group1 = group1;
            }
            if group2.is_some() {
                run_config.groups.group2 = group2;
            }
            if let Some(w) = window_size {
                run_config.engine.window_size = w;
            }
            if let Some(t) = threads {
                run_config.engine.threads = t;
            }
            if deadline_secs.is_some() {
                run_config.engine.deadline_secs = deadline_secs;
            }
            if let Some(db) = db {
                run_config.storage.database = db;
            }
            if cache_dir.is_some() {
                run_config.storage.cache_dir = cache_dir;
            }
            run_engine(&run_config, synthetic, dry_run)
        }
        Commands::Export {
            db,
            window_size,
            pairs,
            out,
        } => run_export(&db, window_size, &pairs, &out),
        Commands::Status { db, cache_dir } => run_status(&db, cache_dir.as_deref()),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ── ingest ───────────────────────────────────────────────────────────

fn run_ingest(paths: &[PathBuf], db: &Path, cache_dir: Option<&Path>) -> Result<()> {
    let files = collect_json_files(paths)?;
    if files.is_empty() {
        bail!("no .json kline files found");
    }

    let store = SqliteStore::open(db)?;
    let cache = cache_dir.map(ParquetCache::new);
    let mut total = 0;

    for file in &files {
        let bars = load_kline_file(file)?;
        let Some(symbol) = bars.first().map(|b| b.symbol.clone()) else {
            warn!(file = %file.display(), "no rows; skipped");
            continue;
        };
        let written = store
            .upsert_bars(&bars)
            .with_context(|| format!("writing {symbol} to {}", db.display()))?;
        if let Some(cache) = &cache {
            cache.write(&symbol, &bars)?;
        }
        info!(symbol = %symbol, rows = written, "ingested");
        print_ingest_line(&symbol, &bars);
        total += written;
    }

    println!("{total} rows from {} files into {}", files.len(), db.display());
    Ok(())
}

fn collect_json_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("reading directory {}", path.display()))?
            {
                let entry_path = entry?.path();
                if entry_path.extension().is_some_and(|e| e == "json") {
                    files.push(entry_path);
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    files.sort();
    Ok(files)
}

fn print_ingest_line(symbol: &str, bars: &[MarketBar]) {
    let first = bars.iter().map(|b| b.date).min();
    let last = bars.iter().map(|b| b.date).max();
    if let (Some(first), Some(last)) = (first, last) {
        println!("{symbol:<12} {:>6} bars  {first} to {last}", bars.len());
    }
}

// ── run ──────────────────────────────────────────────────────────────

fn run_engine(config: &RunConfig, synthetic: bool, dry_run: bool) -> Result<()> {
    let event = InvocationEvent {
        group1_symbols: config.groups.group1.clone(),
        group2_symbols: config.groups.group2.clone(),
        window_size: Some(config.engine.window_size),
    };
    let deadline = config.engine.deadline_secs.map(Duration::from_secs);

    let response = if synthetic {
        // synthetic closes never touch the database
        let panel = SyntheticPanel::trailing(config.engine.window_size * 4);
        let prior = MemoryStore::new();
        let collaborators = Collaborators {
            panel: &panel,
            prior: &prior,
            sink: None,
            threads: config.engine.threads,
            deadline,
        };
        handle_event(&event, &collaborators)
    } else {
        let store = SqliteStore::open(&config.storage.database)?;
        let cache = config.storage.cache_dir.as_ref().map(ParquetCache::new);
        let panel: &dyn PanelSource = match &cache {
            Some(cache) => cache,
            None => &store,
        };
        let collaborators = Collaborators {
            panel,
            prior: &store,
            sink: if dry_run { None } else { Some(&store as &dyn ResultSink) },
            threads: config.engine.threads,
            deadline,
        };
        handle_event(&event, &collaborators)
    };

    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if !response.is_success() {
        std::process::exit(i32::from(response.status_code / 100));
    }
    Ok(())
}

// ── export / status ──────────────────────────────────────────────────

fn run_export(db: &Path, window_size: usize, pairs: &[String], out: &Path) -> Result<()> {
    let parsed: Vec<SymbolPair> = pairs
        .iter()
        .map(|p| SymbolPair::parse(p).with_context(|| format!("invalid pair '{p}', expected A:B")))
        .collect::<Result<_>>()?;

    let store = SqliteStore::open(db)?;
    let filter = if parsed.is_empty() {
        None
    } else {
        Some(parsed.as_slice())
    };
    let records = store.load_records(window_size, filter)?;
    save_records_csv(&records, out)?;
    println!("{} rows written to {}", records.len(), out.display());
    Ok(())
}

fn run_status(db: &Path, cache_dir: Option<&Path>) -> Result<()> {
    if db.exists() {
        print_database_status(db)?;
    } else {
        println!("Database does not exist: {}", db.display());
    }
    if let Some(cache_dir) = cache_dir {
        println!();
        print_cache_status(&ParquetCache::new(cache_dir))?;
    }
    Ok(())
}

fn show_date(date: Option<chrono::NaiveDate>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.to_string())
}

fn print_database_status(db: &Path) -> Result<()> {
    let store = SqliteStore::open(db)?;

    println!("Database: {}", db.display());
    println!();
    println!("{:<16} {:>10} {:<12} {:<12}", "Table", "Rows", "First", "Latest");
    println!("{}", "-".repeat(53));
    for stats in store.table_stats()? {
        println!(
            "{:<16} {:>10} {:<12} {:<12}",
            stats.table,
            stats.rows,
            show_date(stats.first_date),
            show_date(stats.latest_date)
        );
    }

    let symbols = store.market_symbols()?;
    if !symbols.is_empty() {
        println!();
        println!("Symbols ({}): {}", symbols.len(), symbols.join(", "));
    }
    Ok(())
}

fn print_cache_status(cache: &ParquetCache) -> Result<()> {
    let symbols = cache.symbols()?;
    if symbols.is_empty() {
        println!("Cache is empty: {}", cache.cache_dir().display());
        return Ok(());
    }
    let refs: Vec<&str> = symbols.iter().map(String::as_str).collect();

    println!("Cache: {}", cache.cache_dir().display());
    println!();
    println!("{:<16} {:<12} {:<12} {:>8}", "Symbol", "First", "Latest", "Bars");
    println!("{}", "-".repeat(51));
    for status in cache.status(&refs) {
        let bars = status
            .bar_count
            .map_or_else(|| "(no meta)".to_string(), |n| n.to_string());
        println!(
            "{:<16} {:<12} {:<12} {:>8}",
            status.symbol,
            show_date(status.start_date),
            show_date(status.end_date),
            bars
        );
    }
    Ok(())
}
