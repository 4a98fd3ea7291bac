//! Run orchestration: enumerate pairs, load the panel, plan against prior
//! results, compute pairs on a private rayon pool, assemble, persist.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use cointlab_core::data::PanelSource;
use cointlab_core::domain::{CointegrationRecord, SymbolPair};
use cointlab_core::pairs::symbols_of;
use cointlab_core::stats::CointegrationTest;
use cointlab_core::{
    assemble, enumerate_pairs, plan_all, PairFailure, PairOutcome, RollingCalculator,
};

use crate::config::{ConfigError, RunConfig};
use crate::data_loader::{load_panel, LoadError};
use crate::store::{PriorResultsSource, ResultSink, StoreError};

/// Run-level failures. Per-pair failures never surface here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Load(#[from] LoadError),

    #[error("results not durably saved: {0}")]
    Store(#[from] StoreError),

    #[error("failed to build worker pool: {0}")]
    Pool(String),
}

/// Engine knobs independent of the symbol groups.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub window_size: usize,
    /// Worker threads; 0 means one per available core.
    pub threads: usize,
    /// Pairs not started by this deadline are skipped.
    pub deadline: Option<Duration>,
}

impl EngineOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            window_size: config.engine.window_size,
            threads: config.engine.threads,
            deadline: config.deadline(),
        }
    }
}

/// Full outcome of a run, including the records.
#[derive(Debug, Clone)]
pub struct EngineReport {
    pub pairs_total: usize,
    pub pairs_computed: usize,
    pub pairs_failed: Vec<PairFailure>,
    /// Pairs not started before the deadline.
    pub pairs_skipped: Vec<SymbolPair>,
    pub rows_new: usize,
    pub rows_untestable: usize,
    /// Rows written by the sink; `None` when nothing was persisted.
    pub rows_persisted: Option<usize>,
    pub records: Vec<CointegrationRecord>,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub window_size: usize,
    pub test_name: String,
    pub elapsed_ms: u64,
}

/// Serializable summary of a run, without the records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub pairs_total: usize,
    pub pairs_computed: usize,
    pub pairs_failed: Vec<PairFailure>,
    pub pairs_skipped: Vec<SymbolPair>,
    pub rows_new: usize,
    pub rows_untestable: usize,
    pub rows_persisted: Option<usize>,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub window_size: usize,
    pub test_name: String,
    pub elapsed_ms: u64,
}

impl EngineReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            pairs_total: self.pairs_total,
            pairs_computed: self.pairs_computed,
            pairs_failed: self.pairs_failed.clone(),
            pairs_skipped: self.pairs_skipped.clone(),
            rows_new: self.rows_new,
            rows_untestable: self.rows_untestable,
            rows_persisted: self.rows_persisted,
            dataset_hash: self.dataset_hash.clone(),
            has_synthetic: self.has_synthetic,
            window_size: self.window_size,
            test_name: self.test_name.clone(),
            elapsed_ms: self.elapsed_ms,
        }
    }
}

/// The pairwise rolling cointegration engine.
pub struct Engine<T> {
    calculator: RollingCalculator<T>,
    options: EngineOptions,
}

impl<T: CointegrationTest> Engine<T> {
    pub fn new(test: T, options: EngineOptions) -> Result<Self, EngineError> {
        let calculator = RollingCalculator::new(test, options.window_size)
            .map_err(|_| ConfigError::WindowTooSmall(options.window_size))?;
        Ok(Self {
            calculator,
            options,
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Compute new records for `group1 × group2` without persisting them.
    pub fn run<A, B>(
        &self,
        group1: &[A],
        group2: &[B],
        panel_source: &dyn PanelSource,
        prior: &dyn PriorResultsSource,
    ) -> Result<EngineReport, EngineError>
    where
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let started = Instant::now();
        let window_size = self.options.window_size;

        let pairs = enumerate_pairs(group1, group2);
        info!(pairs = pairs.len(), window_size, "pairs enumerated");

        let loaded = load_panel(panel_source, &symbols_of(&pairs))?;
        let latest = prior.latest_dates(&pairs, window_size)?;
        let plans = plan_all(&loaded.panel, &pairs, window_size, &latest)
            .map_err(ConfigError::from)?;
        info!(
            full_history = plans.iter().filter(|p| p.is_full_history()).count(),
            incremental = plans.iter().filter(|p| !p.is_full_history()).count(),
            "pairs planned"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads)
            .build()
            .map_err(|e| EngineError::Pool(e.to_string()))?;

        let deadline = self.options.deadline;
        let panel = &loaded.panel;
        let calculator = &self.calculator;
        let slots: Vec<Result<PairOutcome, SymbolPair>> = pool.install(|| {
            plans
                .into_par_iter()
                .map(|plan| {
                    if deadline.is_some_and(|d| started.elapsed() >= d) {
                        return Err(plan.pair);
                    }
                    let result = calculator.compute_plan(panel, &plan);
                    Ok(PairOutcome { plan, result })
                })
                .collect()
        });

        let mut outcomes = Vec::with_capacity(slots.len());
        let mut skipped = Vec::new();
        for slot in slots {
            match slot {
                Ok(outcome) => outcomes.push(outcome),
                Err(pair) => skipped.push(pair),
            }
        }
        if !skipped.is_empty() {
            warn!(skipped = skipped.len(), "deadline reached; pairs skipped");
        }

        let assembly = assemble(outcomes);
        for failure in &assembly.failures {
            warn!(pair = %failure.pair, reason = %failure.reason, "pair failed");
        }
        info!(
            computed = assembly.pairs_computed,
            failed = assembly.failures.len(),
            skipped = skipped.len(),
            rows_new = assembly.records.len(),
            rows_untestable = assembly.rows_untestable,
            "pairs computed"
        );

        Ok(EngineReport {
            pairs_total: pairs.len(),
            pairs_computed: assembly.pairs_computed,
            pairs_failed: assembly.failures,
            pairs_skipped: skipped,
            rows_new: assembly.records.len(),
            rows_untestable: assembly.rows_untestable,
            rows_persisted: None,
            records: assembly.records,
            dataset_hash: loaded.dataset_hash,
            has_synthetic: loaded.has_synthetic,
            window_size,
            test_name: calculator.test().name().to_string(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// `run`, then upsert the new records into `sink`.
    ///
    /// A sink failure fails the whole run; the upsert is idempotent so the
    /// run can simply be repeated.
    pub fn run_and_persist<A, B>(
        &self,
        group1: &[A],
        group2: &[B],
        panel_source: &dyn PanelSource,
        prior: &dyn PriorResultsSource,
        sink: &dyn ResultSink,
    ) -> Result<EngineReport, EngineError>
    where
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let mut report = self.run(group1, group2, panel_source, prior)?;
        let written = sink.upsert(&report.records)?;
        info!(rows = written, "rows persisted");
        report.rows_persisted = Some(written);
        Ok(report)
    }
}
