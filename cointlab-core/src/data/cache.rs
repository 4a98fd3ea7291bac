//! Parquet price cache with Hive-style partitioning.
//!
//! Layout: `{cache_dir}/symbol={SYMBOL}/{year}.parquet`
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Merge on write: new bars replace cached bars on the same date
//! - Integrity validation on load (schema check, row count > 0)
//! - Quarantine for corrupt files ({filename}.quarantined)
//! - Metadata sidecar per symbol (hash, date range, source)

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::provider::{DataError, PanelSource};
use crate::domain::{MarketBar, PricePoint};

const EXPECTED_COLUMNS: [&str; 11] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_volume",
    "trades",
    "taker_base_volume",
    "taker_quote_volume",
];

/// Metadata sidecar for a cached symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: String,
    pub cached_at: chrono::NaiveDateTime,
}

/// Cache status for a single symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub symbol: String,
    pub cached: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bar_count: Option<usize>,
}

/// The Parquet cache.
pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Directory for a specific symbol: `{cache_dir}/symbol={SYMBOL}/`
    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("symbol={symbol}"))
    }

    /// Path to the Parquet file for a symbol+year.
    fn year_path(&self, symbol: &str, year: i32) -> PathBuf {
        self.symbol_dir(symbol).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("meta.json")
    }

    /// Symbols with a partition directory, sorted.
    pub fn symbols(&self) -> Result<Vec<String>, DataError> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.cache_dir)? {
            let name = entry?.file_name().to_string_lossy().to_string();
            if let Some(symbol) = name.strip_prefix("symbol=") {
                symbols.push(symbol.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    /// Write bars for a symbol, merging with what is already cached.
    ///
    /// Bars on a date already cached replace the cached bar. Groups bars by
    /// year and rewrites one Parquet file per touched year.
    pub fn write(&self, symbol: &str, bars: &[MarketBar]) -> Result<(), DataError> {
        if bars.is_empty() {
            return Err(DataError::CacheError("no bars to cache".into()));
        }

        let sym_dir = self.symbol_dir(symbol);
        fs::create_dir_all(&sym_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut merged: BTreeMap<NaiveDate, MarketBar> = match self.load(symbol) {
            Ok(existing) => existing.into_iter().map(|b| (b.date, b)).collect(),
            Err(DataError::NoCachedData { .. }) => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        let touched: Vec<i32> = {
            let mut years: Vec<i32> = bars.iter().map(|b| b.date.year()).collect();
            years.sort_unstable();
            years.dedup();
            years
        };
        for bar in bars {
            merged.insert(bar.date, bar.clone());
        }

        let mut by_year: HashMap<i32, Vec<&MarketBar>> = HashMap::new();
        for bar in merged.values() {
            by_year.entry(bar.date.year()).or_default().push(bar);
        }

        for year in &touched {
            let Some(year_bars) = by_year.get(year) else {
                continue;
            };
            let df = bars_to_dataframe(year_bars)?;
            let path = self.year_path(symbol, *year);
            let tmp_path = path.with_extension("parquet.tmp");

            write_parquet(&df, &tmp_path)?;

            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                DataError::CacheError(format!("atomic rename failed: {e}"))
            })?;
        }

        let all: Vec<&MarketBar> = merged.values().collect();
        let (Some(first), Some(last)) = (all.first(), all.last()) else {
            return Ok(());
        };
        let meta = CacheMeta {
            symbol: symbol.to_string(),
            start_date: first.date,
            end_date: last.date,
            bar_count: all.len(),
            data_hash: blake3::hash(
                &serde_json::to_vec(&all)
                    .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            source: "kline".to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(symbol), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        debug!(symbol, bars = bars.len(), total = meta.bar_count, "cache write");
        Ok(())
    }

    /// Load all cached bars for a symbol, sorted by date ascending.
    pub fn load(&self, symbol: &str) -> Result<Vec<MarketBar>, DataError> {
        let sym_dir = self.symbol_dir(symbol);
        if !sym_dir.exists() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        let mut all_bars = Vec::new();

        let entries =
            fs::read_dir(&sym_dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let path = entry.path();

            // Skip non-parquet files (meta.json, .quarantined, etc)
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_parquet(symbol, &path) {
                Ok(bars) => all_bars.extend(bars),
                Err(e) => {
                    let quarantine = path.with_extension("parquet.quarantined");
                    warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                    let _ = fs::rename(&path, &quarantine);
                }
            }
        }

        if all_bars.is_empty() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        all_bars.sort_by_key(|b| b.date);
        Ok(all_bars)
    }

    pub fn get_meta(&self, symbol: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Which symbols have cached data, and their date ranges.
    pub fn status(&self, symbols: &[&str]) -> Vec<CacheStatus> {
        symbols
            .iter()
            .map(|sym| {
                let meta = self.get_meta(sym);
                CacheStatus {
                    symbol: sym.to_string(),
                    cached: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    bar_count: meta.as_ref().map(|m| m.bar_count),
                }
            })
            .collect()
    }
}

impl PanelSource for ParquetCache {
    fn name(&self) -> &str {
        "parquet-cache"
    }

    fn load_points(&self, symbols: &[String]) -> Result<Vec<PricePoint>, DataError> {
        let all;
        let symbols = if symbols.is_empty() {
            all = self.symbols()?;
            all.as_slice()
        } else {
            symbols
        };
        let mut points = Vec::new();
        for symbol in symbols {
            match self.load(symbol) {
                Ok(bars) => points.extend(bars.iter().map(MarketBar::price_point)),
                Err(DataError::NoCachedData { .. }) => {
                    debug!(symbol = %symbol, "symbol not cached");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(points)
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

fn bars_to_dataframe(bars: &[&MarketBar]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars.iter().map(|b| days_since_epoch(b.date)).collect();
    let close_times: Vec<i32> = bars.iter().map(|b| days_since_epoch(b.close_time)).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let quote_volumes: Vec<f64> = bars.iter().map(|b| b.quote_volume).collect();
    let trades: Vec<u64> = bars.iter().map(|b| b.trades).collect();
    let taker_base: Vec<f64> = bars.iter().map(|b| b.taker_base_volume).collect();
    let taker_quote: Vec<f64> = bars.iter().map(|b| b.taker_quote_volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("close_time".into(), close_times)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("close_time cast: {e}")))?,
        Column::new("quote_volume".into(), quote_volumes),
        Column::new("trades".into(), trades),
        Column::new("taker_base_volume".into(), taker_base),
        Column::new("taker_quote_volume".into(), taker_quote),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(symbol: &str, path: &Path) -> Result<Vec<MarketBar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }

    for col_name in &EXPECTED_COLUMNS {
        if df.column(col_name).is_err() {
            return Err(DataError::ValidationError(format!(
                "missing column '{col_name}'"
            )));
        }
    }

    dataframe_to_bars(symbol, &df)
}

fn dataframe_to_bars(symbol: &str, df: &DataFrame) -> Result<Vec<MarketBar>, DataError> {
    let column = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::ParquetError(format!("column read: {e}")))
    };
    let type_err = |name: &'static str| {
        move |e: PolarsError| DataError::ParquetError(format!("{name} column type: {e}"))
    };

    let date_ca = column("date")?.date().map_err(type_err("date"))?;
    let close_time_ca = column("close_time")?.date().map_err(type_err("close_time"))?;
    let open_ca = column("open")?.f64().map_err(type_err("open"))?;
    let high_ca = column("high")?.f64().map_err(type_err("high"))?;
    let low_ca = column("low")?.f64().map_err(type_err("low"))?;
    let close_ca = column("close")?.f64().map_err(type_err("close"))?;
    let volume_ca = column("volume")?.f64().map_err(type_err("volume"))?;
    let quote_ca = column("quote_volume")?.f64().map_err(type_err("quote_volume"))?;
    let trades_ca = column("trades")?.u64().map_err(type_err("trades"))?;
    let taker_base_ca = column("taker_base_volume")?
        .f64()
        .map_err(type_err("taker_base_volume"))?;
    let taker_quote_ca = column("taker_quote_volume")?
        .f64()
        .map_err(type_err("taker_quote_volume"))?;

    let epoch = epoch();
    let n = df.height();
    let mut bars = Vec::with_capacity(n);

    for i in 0..n {
        let date_days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        let date = epoch + chrono::Duration::days(date_days as i64);
        let close_time = close_time_ca
            .get(i)
            .map(|d| epoch + chrono::Duration::days(d as i64))
            .unwrap_or(date);

        bars.push(MarketBar {
            symbol: symbol.to_string(),
            date,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: volume_ca.get(i).unwrap_or(0.0),
            close_time,
            quote_volume: quote_ca.get(i).unwrap_or(0.0),
            trades: trades_ca.get(i).unwrap_or(0),
            taker_base_volume: taker_base_ca.get(i).unwrap_or(0.0),
            taker_quote_volume: taker_quote_ca.get(i).unwrap_or(0.0),
        });
    }

    Ok(bars)
}
