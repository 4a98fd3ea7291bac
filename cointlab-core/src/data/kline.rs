//! Binance daily kline files → `MarketBar` rows.
//!
//! A kline file is a JSON array of rows:
//! `[open_time_ms, "open", "high", "low", "close", "volume", close_time_ms,
//!   "quote_volume", trades, "taker_base_volume", "taker_quote_volume", ...]`.
//! Numeric fields may arrive as strings or numbers. The file stem is the symbol.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

use super::provider::DataError;
use crate::domain::MarketBar;

const MIN_FIELDS: usize = 11;

/// Parse a kline JSON document for one symbol.
///
/// Dates are taken from the open time in UTC. When two rows fall on the same
/// date the first one wins. A row with any non-finite numeric field is rejected.
pub fn parse_klines(symbol: &str, json: &str) -> Result<Vec<MarketBar>, DataError> {
    let malformed = |row: usize, reason: String| DataError::MalformedKline {
        source_name: symbol.to_string(),
        row,
        reason,
    };

    let doc: Value =
        serde_json::from_str(json).map_err(|e| malformed(0, format!("invalid JSON: {e}")))?;
    let rows = doc
        .as_array()
        .ok_or_else(|| malformed(0, "top level is not an array".into()))?;

    let mut seen: HashSet<NaiveDate> = HashSet::with_capacity(rows.len());
    let mut bars = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let fields = row
            .as_array()
            .ok_or_else(|| malformed(i, "row is not an array".into()))?;
        if fields.len() < MIN_FIELDS {
            return Err(malformed(
                i,
                format!("expected at least {MIN_FIELDS} fields, got {}", fields.len()),
            ));
        }

        let num = |idx: usize, name: &str| match field_f64(&fields[idx]) {
            Some(v) if v.is_finite() => Ok(v),
            Some(_) => Err(malformed(i, format!("non-finite {name}"))),
            None => Err(malformed(i, format!("bad {name}"))),
        };

        let date = millis_to_date(num(0, "open time")?)
            .ok_or_else(|| malformed(i, "open time out of range".into()))?;
        let close_time = millis_to_date(num(6, "close time")?)
            .ok_or_else(|| malformed(i, "close time out of range".into()))?;

        let bar = MarketBar {
            symbol: symbol.to_string(),
            date,
            open: num(1, "open")?,
            high: num(2, "high")?,
            low: num(3, "low")?,
            close: num(4, "close")?,
            volume: num(5, "volume")?,
            close_time,
            quote_volume: num(7, "quote volume")?,
            trades: num(8, "trades")?.max(0.0) as u64,
            taker_base_volume: num(9, "taker base volume")?,
            taker_quote_volume: num(10, "taker quote volume")?,
        };

        if !seen.insert(date) {
            debug!(symbol, %date, row = i, "duplicate kline date skipped");
            continue;
        }
        if !bar.is_sane() {
            warn!(symbol, %date, row = i, "kline fails OHLC sanity check");
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

/// Read a kline file; the symbol is the file stem (`BTCUSDT.json` → `BTCUSDT`).
pub fn load_kline_file(path: &Path) -> Result<Vec<MarketBar>, DataError> {
    let symbol = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            DataError::ValidationError(format!("cannot derive symbol from {}", path.display()))
        })?;
    let json = std::fs::read_to_string(path)?;
    parse_klines(symbol, &json).map_err(|e| match e {
        DataError::MalformedKline { row, reason, .. } => DataError::MalformedKline {
            source_name: path.display().to_string(),
            row,
            reason,
        },
        other => other,
    })
}

fn field_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn millis_to_date(ms: f64) -> Option<NaiveDate> {
    if !ms.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(ms as i64).map(|dt| dt.date_naive())
}
