//! Price data: panel sources, alignment, Parquet cache, kline ingestion

pub mod align;
pub mod cache;
pub mod kline;
pub mod provider;

pub use align::{align_points, AlignedPanel};
pub use cache::{CacheMeta, CacheStatus, ParquetCache};
pub use kline::{load_kline_file, parse_klines};
pub use provider::{DataError, PanelSource};
