//! Rolling-window cointegration over two aligned series.
//!
//! The window for end position `e` covers `[e - W, e)` and the result is
//! dated at axis position `e`, so a series of length N yields `N - W`
//! results. A window touching a hole is `Untestable`; it is never tested
//! over a shortened window.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use crate::data::AlignedPanel;
use crate::domain::{PValue, SymbolPair, WindowResult};
use crate::planner::WindowPlan;
use crate::stats::{CointegrationTest, StatError};

/// Smallest window the calculator accepts.
pub const MIN_WINDOW: usize = 2;

/// A failure that stops one pair without affecting the others.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PairError {
    #[error("series lengths differ: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("window size {window_size} is below the minimum of 2")]
    InvalidWindow { window_size: usize },

    #[error("no aligned series for '{symbol}'")]
    MissingSeries { symbol: String },

    #[error("test failed on window ending {date}: {source}")]
    Stat {
        date: NaiveDate,
        #[source]
        source: StatError,
    },
}

/// Slides a fixed window across a pair and runs the test on each window.
#[derive(Debug, Clone)]
pub struct RollingCalculator<T> {
    test: T,
    window_size: usize,
}

impl<T: CointegrationTest> RollingCalculator<T> {
    pub fn new(test: T, window_size: usize) -> Result<Self, PairError> {
        if window_size < MIN_WINDOW {
            return Err(PairError::InvalidWindow { window_size });
        }
        Ok(Self { test, window_size })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn test(&self) -> &T {
        &self.test
    }

    /// One result per end position `W..len`, dated `dates[end]`.
    ///
    /// `first` is the dependent series of the cointegrating regression.
    /// `window_size > len` gives an empty result.
    pub fn compute(
        &self,
        pair: &SymbolPair,
        dates: &[NaiveDate],
        first: &[f64],
        second: &[f64],
    ) -> Result<Vec<WindowResult>, PairError> {
        if first.len() != second.len() {
            return Err(PairError::LengthMismatch {
                left: first.len(),
                right: second.len(),
            });
        }
        if dates.len() != first.len() {
            return Err(PairError::LengthMismatch {
                left: dates.len(),
                right: first.len(),
            });
        }

        let w = self.window_size;
        let len = first.len();
        if w > len {
            return Ok(Vec::new());
        }

        // holes[i] = number of positions < i where either series is NaN
        let mut holes = Vec::with_capacity(len + 1);
        holes.push(0usize);
        for (a, b) in first.iter().zip(second) {
            let last = holes[holes.len() - 1];
            holes.push(last + usize::from(a.is_nan() || b.is_nan()));
        }

        let mut results = Vec::with_capacity(len - w);
        for end in w..len {
            let start = end - w;
            let date = dates[end];
            let p_value = if holes[end] - holes[start] > 0 {
                PValue::Untestable
            } else {
                let p = self
                    .test
                    .p_value(&first[start..end], &second[start..end])
                    .map_err(|source| PairError::Stat { date, source })?;
                PValue::Tested(p)
            };
            results.push(WindowResult {
                pair: pair.clone(),
                date,
                window_size: w,
                p_value,
            });
        }
        Ok(results)
    }

    /// Run a plan against the panel, covering axis positions `start_index..`.
    pub fn compute_plan(
        &self,
        panel: &AlignedPanel,
        plan: &WindowPlan,
    ) -> Result<Vec<WindowResult>, PairError> {
        let series = |symbol: &str| {
            panel.series(symbol).ok_or_else(|| PairError::MissingSeries {
                symbol: symbol.to_string(),
            })
        };
        let first = series(plan.pair.first())?;
        let second = series(plan.pair.second())?;
        let start = plan.start_index.min(panel.dates.len());

        let results = self.compute(
            &plan.pair,
            &panel.dates[start..],
            &first[start..],
            &second[start..],
        )?;
        debug!(
            pair = %plan.pair,
            start_index = start,
            windows = results.len(),
            test = self.test.name(),
            "pair computed"
        );
        Ok(results)
    }
}
