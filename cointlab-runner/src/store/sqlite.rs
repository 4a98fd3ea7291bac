//! SQLite store for market bars and cointegration results.

use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use cointlab_core::data::{DataError, PanelSource};
use cointlab_core::domain::{CointegrationRecord, MarketBar, PricePoint, SymbolPair};

use super::schema::{
    cointegration_rows, decode_p_value, format_date, market_rows, parse_date, RecordKind,
};
use super::{PriorResultsSource, ResultSink, StoreError};

/// Row count and date range of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub table: String,
    pub rows: u64,
    pub first_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
}

/// One SQLite database holding every record kind.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    label: String,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the tables exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self {
            conn: Mutex::new(conn),
            label: path.display().to_string(),
        };
        store.create_tables()?;
        info!(database = %store.label, "sqlite store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            label: ":memory:".to_string(),
        };
        store.create_tables()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Create every table if missing.
    pub fn create_tables(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        for kind in RecordKind::ALL {
            conn.execute_batch(kind.schema().create_sql)?;
        }
        Ok(())
    }

    pub fn drop_table(&self, kind: RecordKind) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", kind.table()))?;
        info!(table = kind.table(), "table dropped");
        Ok(())
    }

    /// Upsert market bars in one transaction.
    pub fn upsert_bars(&self, bars: &[MarketBar]) -> Result<usize, StoreError> {
        let rows = market_rows(bars);
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(RecordKind::MarketData.schema().upsert_sql)?;
            for bar in &rows {
                stmt.execute(params![
                    bar.symbol,
                    format_date(bar.date),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                    format_date(bar.close_time),
                    bar.quote_volume,
                    bar.trades as i64,
                    bar.taker_base_volume,
                    bar.taker_quote_volume,
                ])?;
            }
        }
        tx.commit()?;
        debug!(rows = rows.len(), "market data upserted");
        Ok(rows.len())
    }

    /// Stored records at `window_size`, optionally restricted to some pairs,
    /// ordered by pair then date.
    pub fn load_records(
        &self,
        window_size: usize,
        pairs: Option<&[SymbolPair]>,
    ) -> Result<Vec<CointegrationRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT symbol_one, symbol_two, date, coint_p_value
             FROM cointegration
             WHERE window_size = ?1
             ORDER BY symbol_one, symbol_two, date",
        )?;
        let rows = stmt.query_map([window_size as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<f64>>(3)?,
            ))
        })?;

        let wanted: Option<HashSet<&SymbolPair>> = pairs.map(|p| p.iter().collect());
        let mut records = Vec::new();
        for row in rows {
            let (symbol_one, symbol_two, date, p) = row?;
            if let Some(wanted) = &wanted {
                let keep = SymbolPair::new(symbol_one.as_str(), symbol_two.as_str())
                    .is_some_and(|pair| wanted.contains(&pair));
                if !keep {
                    continue;
                }
            }
            records.push(CointegrationRecord {
                date: parse_stored_date("cointegration", &date)?,
                symbol_one,
                symbol_two,
                window_size,
                p_value: decode_p_value(p),
            });
        }
        Ok(records)
    }

    /// Row counts and date ranges for every table.
    pub fn table_stats(&self) -> Result<Vec<TableStats>, StoreError> {
        let conn = self.lock()?;
        let mut stats = Vec::new();
        for kind in RecordKind::ALL {
            let (rows, first, latest): (i64, Option<String>, Option<String>) = conn.query_row(
                &format!("SELECT COUNT(*), MIN(date), MAX(date) FROM {}", kind.table()),
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;
            stats.push(TableStats {
                table: kind.table().to_string(),
                rows: rows.max(0) as u64,
                first_date: first.as_deref().and_then(parse_date),
                latest_date: latest.as_deref().and_then(parse_date),
            });
        }
        Ok(stats)
    }

    /// Distinct symbols in the market table.
    pub fn market_symbols(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT symbol FROM market_data ORDER BY symbol")?;
        let symbols = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(symbols)
    }
}

fn parse_stored_date(table: &'static str, raw: &str) -> Result<NaiveDate, StoreError> {
    parse_date(raw).ok_or_else(|| StoreError::Corrupt {
        table,
        reason: format!("bad date '{raw}'"),
    })
}

impl PanelSource for SqliteStore {
    fn name(&self) -> &str {
        &self.label
    }

    fn load_points(&self, symbols: &[String]) -> Result<Vec<PricePoint>, DataError> {
        let conn = self
            .lock()
            .map_err(|e| DataError::Source(e.to_string()))?;
        let sql = if symbols.is_empty() {
            "SELECT date, symbol, close FROM market_data".to_string()
        } else {
            let placeholders = vec!["?"; symbols.len()].join(", ");
            format!("SELECT date, symbol, close FROM market_data WHERE symbol IN ({placeholders})")
        };
        let query = || -> Result<Vec<PricePoint>, StoreError> {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(symbols.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })?;
            let mut points = Vec::new();
            for row in rows {
                let (date, symbol, close) = row?;
                points.push(PricePoint {
                    date: parse_stored_date("market_data", &date)?,
                    symbol,
                    close,
                });
            }
            Ok(points)
        };
        query().map_err(|e| DataError::Source(e.to_string()))
    }
}

impl PriorResultsSource for SqliteStore {
    fn latest_dates(
        &self,
        pairs: &[SymbolPair],
        window_size: usize,
    ) -> Result<HashMap<SymbolPair, NaiveDate>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT symbol_one, symbol_two, MAX(date)
             FROM cointegration
             WHERE window_size = ?1
             GROUP BY symbol_one, symbol_two",
        )?;
        let rows = stmt.query_map([window_size as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let wanted: HashSet<&SymbolPair> = pairs.iter().collect();
        let mut latest = HashMap::new();
        for row in rows {
            let (one, two, date) = row?;
            let Some(pair) = SymbolPair::new(one, two) else {
                continue;
            };
            if wanted.contains(&pair) {
                latest.insert(pair, parse_stored_date("cointegration", &date)?);
            }
        }
        Ok(latest)
    }
}

impl ResultSink for SqliteStore {
    fn upsert(&self, records: &[CointegrationRecord]) -> Result<usize, StoreError> {
        let rows = cointegration_rows(records);
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(RecordKind::Cointegration.schema().upsert_sql)?;
            for row in &rows {
                stmt.execute(params![
                    row.symbol_one,
                    row.symbol_two,
                    row.date,
                    row.window_size,
                    row.coint_p_value,
                ])?;
            }
        }
        tx.commit()?;
        debug!(rows = rows.len(), "cointegration rows upserted");
        Ok(rows.len())
    }
}
