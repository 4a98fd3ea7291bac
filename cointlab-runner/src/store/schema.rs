//! Record kinds persisted by the SQLite store.
//!
//! Each kind pairs a table schema (name, DDL, upsert statement) with a
//! transform from domain rows to the tuples written to that table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use cointlab_core::domain::{CointegrationRecord, MarketBar, PValue};

/// Storage date format; ISO dates sort lexicographically.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Table definition for one record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub table: &'static str,
    pub create_sql: &'static str,
    pub upsert_sql: &'static str,
    pub key: &'static [&'static str],
}

const MARKET_DATA: TableSchema = TableSchema {
    table: "market_data",
    create_sql: "CREATE TABLE IF NOT EXISTS market_data (
        symbol TEXT NOT NULL,
        date TEXT NOT NULL,
        open REAL NOT NULL,
        high REAL NOT NULL,
        low REAL NOT NULL,
        close REAL NOT NULL,
        volume REAL NOT NULL,
        close_time TEXT NOT NULL,
        quote_volume REAL NOT NULL,
        trades INTEGER NOT NULL,
        taker_base_volume REAL NOT NULL,
        taker_quote_volume REAL NOT NULL,
        PRIMARY KEY (symbol, date)
    )",
    upsert_sql: "INSERT INTO market_data (
        symbol, date, open, high, low, close, volume, close_time,
        quote_volume, trades, taker_base_volume, taker_quote_volume
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
    ON CONFLICT(symbol, date) DO UPDATE SET
        open = excluded.open,
        high = excluded.high,
        low = excluded.low,
        close = excluded.close,
        volume = excluded.volume,
        close_time = excluded.close_time,
        quote_volume = excluded.quote_volume,
        trades = excluded.trades,
        taker_base_volume = excluded.taker_base_volume,
        taker_quote_volume = excluded.taker_quote_volume",
    key: &["symbol", "date"],
};

// coint_p_value is nullable: SQLite stores a NaN double as NULL.
const COINTEGRATION: TableSchema = TableSchema {
    table: "cointegration",
    create_sql: "CREATE TABLE IF NOT EXISTS cointegration (
        symbol_one TEXT NOT NULL,
        symbol_two TEXT NOT NULL,
        date TEXT NOT NULL,
        window_size INTEGER NOT NULL,
        coint_p_value REAL,
        PRIMARY KEY (symbol_one, symbol_two, date, window_size)
    )",
    upsert_sql: "INSERT INTO cointegration (
        symbol_one, symbol_two, date, window_size, coint_p_value
    ) VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(symbol_one, symbol_two, date, window_size) DO UPDATE SET
        coint_p_value = excluded.coint_p_value",
    key: &["symbol_one", "symbol_two", "date", "window_size"],
};

/// The closed set of persisted record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    MarketData,
    Cointegration,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::MarketData, RecordKind::Cointegration];

    pub fn schema(self) -> &'static TableSchema {
        match self {
            RecordKind::MarketData => &MARKET_DATA,
            RecordKind::Cointegration => &COINTEGRATION,
        }
    }

    pub fn table(self) -> &'static str {
        self.schema().table
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "market_data" => Some(RecordKind::MarketData),
            "cointegration" => Some(RecordKind::Cointegration),
            _ => None,
        }
    }
}

/// Tuple written to the cointegration table.
#[derive(Debug, Clone, PartialEq)]
pub struct CointegrationRow {
    pub symbol_one: String,
    pub symbol_two: String,
    pub date: String,
    pub window_size: i64,
    pub coint_p_value: f64,
}

/// Records → rows. Keeps the first row per key; Untestable becomes −1.
pub fn cointegration_rows(records: &[CointegrationRecord]) -> Vec<CointegrationRow> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .iter()
        .filter(|r| seen.insert((&r.symbol_one, &r.symbol_two, r.date, r.window_size)))
        .map(|r| CointegrationRow {
            symbol_one: r.symbol_one.clone(),
            symbol_two: r.symbol_two.clone(),
            date: r.date.format(DATE_FORMAT).to_string(),
            window_size: r.window_size as i64,
            coint_p_value: r.p_value.to_stored(),
        })
        .collect()
}

/// Bars → rows for the market table. Keeps the first bar per (symbol, date).
pub fn market_rows(bars: &[MarketBar]) -> Vec<&MarketBar> {
    let mut seen = HashSet::with_capacity(bars.len());
    bars.iter()
        .filter(|b| seen.insert((b.symbol.as_str(), b.date)))
        .collect()
}

/// Decode a stored p-value column.
pub fn decode_p_value(raw: Option<f64>) -> PValue {
    match raw {
        Some(v) => PValue::from_stored(v),
        None => PValue::Tested(f64::NAN),
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}
