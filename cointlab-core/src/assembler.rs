//! Merge per-pair outcomes into the persistable result set.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::{CointegrationRecord, SymbolPair, WindowResult};
use crate::planner::WindowPlan;
use crate::rolling::PairError;

/// What one pair produced: its plan and either results or a failure.
#[derive(Debug, Clone)]
pub struct PairOutcome {
    pub plan: WindowPlan,
    pub result: Result<Vec<WindowResult>, PairError>,
}

/// A pair that failed, reported next to the successful records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFailure {
    pub pair: SymbolPair,
    pub reason: String,
}

/// The incremental output of a run.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub records: Vec<CointegrationRecord>,
    pub failures: Vec<PairFailure>,
    pub pairs_computed: usize,
    pub rows_untestable: usize,
    /// Results dropped because they were already persisted.
    pub rows_already_persisted: usize,
}

/// Filter each pair's results by its plan, drop duplicate (pair, date)
/// keys, and collect failures. A failing pair never affects the others.
pub fn assemble<I>(outcomes: I) -> Assembly
where
    I: IntoIterator<Item = PairOutcome>,
{
    let mut assembly = Assembly::default();
    let mut seen = HashSet::new();

    for outcome in outcomes {
        let results = match outcome.result {
            Ok(results) => results,
            Err(e) => {
                assembly.failures.push(PairFailure {
                    pair: outcome.plan.pair,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        assembly.pairs_computed += 1;

        for result in results {
            if !outcome.plan.is_new(result.date) {
                assembly.rows_already_persisted += 1;
                continue;
            }
            if !seen.insert((result.pair.clone(), result.date)) {
                continue;
            }
            if result.p_value.is_untestable() {
                assembly.rows_untestable += 1;
            }
            assembly.records.push(CointegrationRecord::from(result));
        }
    }

    assembly
}
