//! Persistence collaborators.
//!
//! The engine talks to storage through two traits:
//! - `PriorResultsSource` — latest persisted date per pair and window size
//! - `ResultSink` — idempotent upsert of cointegration records
//!
//! Price panels come through `cointlab_core::data::PanelSource`. `SqliteStore`
//! implements all three against one database file; `MemoryStore` implements
//! them in-process for tests and dry runs.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStore;
pub use schema::{CointegrationRow, RecordKind, TableSchema};
pub use sqlite::{SqliteStore, TableStats};

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use cointlab_core::domain::{CointegrationRecord, SymbolPair};

/// Errors from a storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt row in '{table}': {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error("store lock poisoned")]
    Poisoned,

    #[error("write rejected: {0}")]
    WriteRejected(String),
}

/// Latest persisted result date per pair.
pub trait PriorResultsSource: Send + Sync {
    /// Maximum stored date for each requested pair at `window_size`.
    /// Pairs with no rows are absent from the map.
    fn latest_dates(
        &self,
        pairs: &[SymbolPair],
        window_size: usize,
    ) -> Result<HashMap<SymbolPair, NaiveDate>, StoreError>;
}

/// Destination for computed records.
pub trait ResultSink: Send + Sync {
    /// Insert new rows and overwrite existing ones on the same key.
    /// Returns the number of rows written; empty input is a no-op.
    fn upsert(&self, records: &[CointegrationRecord]) -> Result<usize, StoreError>;
}

/// Derive the latest date per pair from full rows.
pub fn latest_from_records<'a, I>(
    records: I,
    pairs: &[SymbolPair],
    window_size: usize,
) -> HashMap<SymbolPair, NaiveDate>
where
    I: IntoIterator<Item = &'a CointegrationRecord>,
{
    let wanted: HashSet<&SymbolPair> = pairs.iter().collect();
    let mut latest: HashMap<SymbolPair, NaiveDate> = HashMap::new();
    for record in records {
        if record.window_size != window_size {
            continue;
        }
        let Some(pair) = record.pair() else {
            continue;
        };
        if !wanted.contains(&pair) {
            continue;
        }
        latest
            .entry(pair)
            .and_modify(|d| *d = (*d).max(record.date))
            .or_insert(record.date);
    }
    latest
}
