//! CointLab Runner — configuration, storage, and run orchestration.
//!
//! This crate builds on `cointlab-core` to provide:
//! - TOML run configuration with validation and fingerprinting
//! - Panel loading from any `PanelSource`, with a synthetic fallback
//! - SQLite and in-memory storage collaborators
//! - The parallel pair engine with deadline handling
//! - Invocation handling with structured status codes
//! - CSV export

pub mod config;
pub mod data_loader;
pub mod engine;
pub mod export;
pub mod invocation;
pub mod store;

pub use config::{ConfigError, RunConfig, DEFAULT_WINDOW_SIZE};
pub use data_loader::{load_panel, LoadError, LoadedPanel, SyntheticPanel};
pub use engine::{Engine, EngineError, EngineOptions, EngineReport, RunSummary};
pub use export::{export_records_csv, save_records_csv};
pub use invocation::{
    handle_event, handle_invocation, Collaborators, InvocationEvent, InvocationResponse,
};
pub use store::{
    MemoryStore, PriorResultsSource, RecordKind, ResultSink, SqliteStore, StoreError, TableStats,
};
