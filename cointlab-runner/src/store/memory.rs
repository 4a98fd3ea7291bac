//! In-process store for tests and dry runs.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use cointlab_core::data::{DataError, PanelSource};
use cointlab_core::domain::{CointegrationRecord, PValue, PricePoint, SymbolPair};

use super::{latest_from_records, PriorResultsSource, ResultSink, StoreError};

type RecordKey = (String, String, NaiveDate, usize);

/// Holds price points and cointegration records in memory.
#[derive(Default)]
pub struct MemoryStore {
    points: Mutex<Vec<PricePoint>>,
    records: Mutex<BTreeMap<RecordKey, PValue>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_points(points: Vec<PricePoint>) -> Self {
        Self {
            points: Mutex::new(points),
            ..Self::default()
        }
    }

    pub fn add_points(&self, points: impl IntoIterator<Item = PricePoint>) -> Result<(), StoreError> {
        self.points
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .extend(points);
        Ok(())
    }

    /// Make every subsequent `upsert` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// All stored records, ordered by key.
    pub fn records(&self) -> Result<Vec<CointegrationRecord>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(records
            .iter()
            .map(|((one, two, date, window_size), p)| CointegrationRecord {
                symbol_one: one.clone(),
                symbol_two: two.clone(),
                date: *date,
                window_size: *window_size,
                p_value: *p,
            })
            .collect())
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl PanelSource for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn load_points(&self, symbols: &[String]) -> Result<Vec<PricePoint>, DataError> {
        let points = self
            .points
            .lock()
            .map_err(|_| DataError::Source("memory store lock poisoned".into()))?;
        Ok(points
            .iter()
            .filter(|p| symbols.is_empty() || symbols.contains(&p.symbol))
            .cloned()
            .collect())
    }
}

impl PriorResultsSource for MemoryStore {
    fn latest_dates(
        &self,
        pairs: &[SymbolPair],
        window_size: usize,
    ) -> Result<HashMap<SymbolPair, NaiveDate>, StoreError> {
        let records = self.records()?;
        Ok(latest_from_records(&records, pairs, window_size))
    }
}

impl ResultSink for MemoryStore {
    fn upsert(&self, records: &[CointegrationRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::WriteRejected("memory store configured to fail".into()));
        }
        let mut stored = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        let mut written = 0;
        let mut batch_keys = std::collections::HashSet::new();
        for r in records {
            let key = (r.symbol_one.clone(), r.symbol_two.clone(), r.date, r.window_size);
            if !batch_keys.insert(key.clone()) {
                continue;
            }
            stored.insert(key, r.p_value);
            written += 1;
        }
        Ok(written)
    }
}
