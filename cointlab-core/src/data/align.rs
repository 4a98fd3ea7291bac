//! Multi-symbol time alignment.
//!
//! Given closes for multiple symbols, align them to a common timeline.
//! Missing closes become NaN holes (no forward-fill, no interpolation), so
//! the rolling calculator can work with plain index arithmetic.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

use crate::domain::PricePoint;

/// Closes for multiple symbols on a common, ascending date axis.
#[derive(Debug, Clone, Default)]
pub struct AlignedPanel {
    /// The common date axis (sorted ascending, distinct).
    pub dates: Vec<NaiveDate>,
    /// Closes per symbol, aligned to `dates`. Each Vec has `dates.len()` entries.
    pub closes: HashMap<String, Vec<f64>>,
    /// Symbols included, sorted.
    pub symbols: Vec<String>,
}

impl AlignedPanel {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.closes.contains_key(symbol)
    }

    /// Aligned closes for a symbol.
    pub fn series(&self, symbol: &str) -> Option<&[f64]> {
        self.closes.get(symbol).map(|v| v.as_slice())
    }

    /// Requested symbols that have no data in this panel, in request order.
    pub fn missing_symbols<S: AsRef<str>>(&self, requested: &[S]) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for symbol in requested {
            let symbol = symbol.as_ref();
            if !self.contains(symbol) && !missing.iter().any(|m| m == symbol) {
                missing.push(symbol.to_string());
            }
        }
        missing
    }

    /// Index of the first axis date on or after `date` (`len()` if none).
    pub fn first_index_on_or_after(&self, date: NaiveDate) -> usize {
        self.dates.partition_point(|d| *d < date)
    }

    /// Deterministic BLAKE3 hash over the panel.
    ///
    /// Covers the axis and every close in sorted symbol order, so it's
    /// identical regardless of HashMap iteration order.
    pub fn dataset_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for date in &self.dates {
            hasher.update(date.to_string().as_bytes());
        }
        for symbol in &self.symbols {
            hasher.update(symbol.as_bytes());
            if let Some(closes) = self.closes.get(symbol) {
                for close in closes {
                    hasher.update(&close.to_le_bytes());
                }
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Align price points to a common timeline.
///
/// The axis is the sorted union of every date present. For each date, each
/// symbol either has its close or a NaN hole. If a (symbol, date) appears
/// more than once, the first occurrence wins.
pub fn align_points<I>(points: I) -> AlignedPanel
where
    I: IntoIterator<Item = PricePoint>,
{
    let mut by_symbol: HashMap<String, HashMap<NaiveDate, f64>> = HashMap::new();
    let mut all_dates = BTreeSet::new();

    for point in points {
        all_dates.insert(point.date);
        by_symbol
            .entry(point.symbol)
            .or_default()
            .entry(point.date)
            .or_insert(point.close);
    }

    let dates: Vec<NaiveDate> = all_dates.into_iter().collect();
    let mut symbols: Vec<String> = by_symbol.keys().cloned().collect();
    symbols.sort();

    let closes = by_symbol
        .into_iter()
        .map(|(symbol, date_map)| {
            let aligned: Vec<f64> = dates
                .iter()
                .map(|date| date_map.get(date).copied().unwrap_or(f64::NAN))
                .collect();
            (symbol, aligned)
        })
        .collect();

    AlignedPanel {
        dates,
        closes,
        symbols,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(symbol: &str, date: &str, close: f64) -> PricePoint {
        PricePoint::new(
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            symbol,
            close,
        )
    }

    #[test]
    fn align_fills_missing_with_nan() {
        let input = vec![
            point("BTC", "2024-01-03", 101.0),
            point("ETH", "2024-01-02", 200.0),
            point("BTC", "2024-01-02", 100.0),
            point("BTC", "2024-01-04", 102.0),
            // ETH missing 2024-01-03
            point("ETH", "2024-01-04", 202.0),
        ];

        let panel = align_points(input);

        assert_eq!(panel.len(), 3);
        assert_eq!(panel.series("BTC").unwrap().len(), 3);
        assert_eq!(panel.series("ETH").unwrap().len(), 3);
        assert_eq!(panel.series("BTC").unwrap()[1], 101.0);
        assert!(panel.series("ETH").unwrap()[1].is_nan());
        assert_eq!(panel.symbols, vec!["BTC".to_string(), "ETH".to_string()]);
    }

    #[test]
    fn axis_is_sorted_union() {
        let panel = align_points(vec![
            point("A", "2024-01-05", 1.0),
            point("B", "2024-01-01", 2.0),
            point("A", "2024-01-03", 3.0),
        ]);
        let axis: Vec<String> = panel.dates.iter().map(|d| d.to_string()).collect();
        assert_eq!(axis, vec!["2024-01-01", "2024-01-03", "2024-01-05"]);
    }

    #[test]
    fn empty_input_gives_empty_panel() {
        let panel = align_points(Vec::new());
        assert!(panel.is_empty());
        assert!(panel.symbols.is_empty());
    }

    #[test]
    fn duplicate_point_keeps_first() {
        let panel = align_points(vec![
            point("BTC", "2024-01-02", 100.0),
            point("BTC", "2024-01-02", 999.0),
        ]);
        assert_eq!(panel.series("BTC").unwrap(), &[100.0]);
    }

    #[test]
    fn missing_symbols_reported_once_in_order() {
        let panel = align_points(vec![point("BTC", "2024-01-02", 100.0)]);
        let missing = panel.missing_symbols(&["DOGE", "BTC", "ADA", "DOGE"]);
        assert_eq!(missing, vec!["DOGE".to_string(), "ADA".to_string()]);
    }

    #[test]
    fn first_index_on_or_after() {
        let panel = align_points(vec![
            point("A", "2024-01-02", 1.0),
            point("A", "2024-01-04", 1.0),
            point("A", "2024-01-06", 1.0),
        ]);
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert_eq!(panel.first_index_on_or_after(d("2024-01-01")), 0);
        assert_eq!(panel.first_index_on_or_after(d("2024-01-04")), 1);
        assert_eq!(panel.first_index_on_or_after(d("2024-01-05")), 2);
        assert_eq!(panel.first_index_on_or_after(d("2024-01-07")), 3);
    }

    #[test]
    fn dataset_hash_is_order_independent() {
        let a = align_points(vec![
            point("A", "2024-01-02", 1.0),
            point("B", "2024-01-02", 2.0),
        ]);
        let b = align_points(vec![
            point("B", "2024-01-02", 2.0),
            point("A", "2024-01-02", 1.0),
        ]);
        assert_eq!(a.dataset_hash(), b.dataset_hash());

        let c = align_points(vec![
            point("A", "2024-01-02", 1.5),
            point("B", "2024-01-02", 2.0),
        ]);
        assert_ne!(a.dataset_hash(), c.dataset_hash());
    }
}
