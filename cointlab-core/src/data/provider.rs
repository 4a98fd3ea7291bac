//! Panel source trait and structured error types.
//!
//! The PanelSource trait abstracts over where closes come from (SQLite
//! market table, Parquet cache, in-memory fixtures) so the engine never
//! knows about storage.

use thiserror::Error;

use crate::domain::PricePoint;

/// Structured error types for price data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("cache error: {0}")]
    CacheError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no cached data for symbol '{symbol}' — run `ingest` first")]
    NoCachedData { symbol: String },

    #[error("malformed kline in {source_name} at row {row}: {reason}")]
    MalformedKline {
        source_name: String,
        row: usize,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data source error: {0}")]
    Source(String),
}

/// Read-only feed of (date, symbol, close) rows.
///
/// Implementations must only load the requested symbols. A requested symbol
/// with no data is simply absent from the result; the caller decides whether
/// that is an error.
pub trait PanelSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Load every close for the given symbols, in any order. An empty
    /// request means every symbol the source holds.
    fn load_points(&self, symbols: &[String]) -> Result<Vec<PricePoint>, DataError>;

    /// Whether the closes are generated rather than observed.
    fn is_synthetic(&self) -> bool {
        false
    }
}
