//! Incremental window planning.
//!
//! Given the latest persisted date for a pair, decide which slice of the
//! axis must be recomputed so every new window is covered and nothing older
//! than needed is redone.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::data::AlignedPanel;
use crate::domain::SymbolPair;
use crate::pairs::symbols_of;

/// Raised before any computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("symbols not present in the price panel: {}", symbols.join(", "))]
    MissingSymbols { symbols: Vec<String> },
}

/// Work for one pair: compute over `[start_index, len)` and keep only
/// results dated after `min_new_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPlan {
    pub pair: SymbolPair,
    pub window_size: usize,
    pub start_index: usize,
    pub min_new_date: Option<NaiveDate>,
}

impl WindowPlan {
    pub fn is_full_history(&self) -> bool {
        self.min_new_date.is_none()
    }

    /// Whether a result dated `date` is new for this plan.
    pub fn is_new(&self, date: NaiveDate) -> bool {
        self.min_new_date.map_or(true, |latest| date > latest)
    }
}

/// Plan one pair against the panel axis.
///
/// With a prior latest date the slice starts at the first axis date on or
/// after `latest - window_size` calendar days.
pub fn plan_pair(
    panel: &AlignedPanel,
    pair: &SymbolPair,
    window_size: usize,
    latest: Option<NaiveDate>,
) -> WindowPlan {
    let start_index = match latest {
        None => 0,
        Some(latest) => {
            let threshold = latest
                .checked_sub_signed(Duration::days(window_size as i64))
                .unwrap_or(NaiveDate::MIN);
            panel.first_index_on_or_after(threshold)
        }
    };
    WindowPlan {
        pair: pair.clone(),
        window_size,
        start_index,
        min_new_date: latest,
    }
}

/// Plan every pair. Fails if any pair references a symbol the panel lacks.
pub fn plan_all(
    panel: &AlignedPanel,
    pairs: &[SymbolPair],
    window_size: usize,
    prior: &HashMap<SymbolPair, NaiveDate>,
) -> Result<Vec<WindowPlan>, PlanError> {
    let missing = panel.missing_symbols(&symbols_of(pairs));
    if !missing.is_empty() {
        return Err(PlanError::MissingSymbols { symbols: missing });
    }
    Ok(pairs
        .iter()
        .map(|pair| plan_pair(panel, pair, window_size, prior.get(pair).copied()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::align_points;
    use crate::domain::PricePoint;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n)
    }

    fn panel(days: i64) -> AlignedPanel {
        align_points((0..days).flat_map(|i| {
            [
                PricePoint::new(day(i), "A", 1.0 + i as f64),
                PricePoint::new(day(i), "B", 2.0 + i as f64),
            ]
        }))
    }

    #[test]
    fn no_prior_means_full_history() {
        let panel = panel(10);
        let pair = SymbolPair::new("A", "B").unwrap();
        let plan = plan_pair(&panel, &pair, 5, None);

        assert_eq!(plan.start_index, 0);
        assert!(plan.is_full_history());
        assert!(plan.is_new(day(0)));
    }

    #[test]
    fn prior_latest_backs_off_one_window() {
        let panel = panel(130);
        let pair = SymbolPair::new("A", "B").unwrap();
        let plan = plan_pair(&panel, &pair, 60, Some(day(100)));

        assert_eq!(plan.start_index, 40);
        assert_eq!(plan.min_new_date, Some(day(100)));
        assert!(!plan.is_new(day(100)));
        assert!(plan.is_new(day(101)));
    }

    #[test]
    fn threshold_between_axis_dates_rounds_up() {
        // axis has only even days
        let points = (0..50).flat_map(|i| {
            [
                PricePoint::new(day(2 * i), "A", 1.0),
                PricePoint::new(day(2 * i), "B", 1.0),
            ]
        });
        let panel = align_points(points);
        let pair = SymbolPair::new("A", "B").unwrap();
        // latest day 61, W = 10 -> threshold day 51 -> first axis date day 52
        let plan = plan_pair(&panel, &pair, 10, Some(day(61)));
        assert_eq!(panel.dates[plan.start_index], day(52));
    }

    #[test]
    fn prior_past_the_axis_leaves_nothing() {
        let panel = panel(10);
        let pair = SymbolPair::new("A", "B").unwrap();
        let plan = plan_pair(&panel, &pair, 2, Some(day(500)));
        assert_eq!(plan.start_index, panel.len());
    }

    #[test]
    fn missing_symbol_is_reported_before_planning() {
        let panel = panel(10);
        let pairs = vec![
            SymbolPair::new("A", "B").unwrap(),
            SymbolPair::new("A", "ZZZ").unwrap(),
        ];
        let err = plan_all(&panel, &pairs, 5, &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            PlanError::MissingSymbols {
                symbols: vec!["ZZZ".to_string()]
            }
        );
    }

    #[test]
    fn plan_all_uses_per_pair_prior() {
        let panel = panel(100);
        let ab = SymbolPair::new("A", "B").unwrap();
        let mut prior = HashMap::new();
        prior.insert(ab.clone(), day(80));

        let plans = plan_all(&panel, &[ab], 30, &prior).unwrap();
        assert_eq!(plans[0].start_index, 50);
    }
}
