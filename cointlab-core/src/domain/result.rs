//! Window results and the persisted cointegration record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::pair::SymbolPair;

/// Storage encoding of an untestable window. Outside [0, 1] on purpose.
pub const UNTESTABLE_SENTINEL: f64 = -1.0;

/// Outcome of one rolling window.
///
/// `Untestable` means the window contained a hole in either series and the
/// test was not run. It is a valid result, not a failure, and is persisted.
/// `Tested` carries whatever the test returned, NaN included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PValue {
    Tested(f64),
    Untestable,
}

impl PValue {
    pub fn is_untestable(&self) -> bool {
        matches!(self, PValue::Untestable)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            PValue::Tested(p) => Some(*p),
            PValue::Untestable => None,
        }
    }

    /// Encode for the storage column.
    pub fn to_stored(self) -> f64 {
        match self {
            PValue::Tested(p) => p,
            PValue::Untestable => UNTESTABLE_SENTINEL,
        }
    }

    /// Decode a storage column value.
    pub fn from_stored(raw: f64) -> Self {
        if raw == UNTESTABLE_SENTINEL {
            PValue::Untestable
        } else {
            PValue::Tested(raw)
        }
    }
}

/// One rolling-window result for a pair, dated at the window end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub pair: SymbolPair,
    pub date: NaiveDate,
    pub window_size: usize,
    pub p_value: PValue,
}

/// Durable row, keyed by (symbol_one, symbol_two, date, window_size).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CointegrationRecord {
    pub symbol_one: String,
    pub symbol_two: String,
    pub date: NaiveDate,
    pub window_size: usize,
    pub p_value: PValue,
}

impl CointegrationRecord {
    pub fn pair(&self) -> Option<SymbolPair> {
        SymbolPair::new(self.symbol_one.as_str(), self.symbol_two.as_str())
    }
}

impl From<WindowResult> for CointegrationRecord {
    fn from(result: WindowResult) -> Self {
        Self {
            symbol_one: result.pair.first().to_string(),
            symbol_two: result.pair.second().to_string(),
            date: result.date,
            window_size: result.window_size,
            p_value: result.p_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_encoding() {
        assert_eq!(PValue::Untestable.to_stored(), -1.0);
        assert_eq!(PValue::from_stored(-1.0), PValue::Untestable);
        assert_eq!(PValue::from_stored(0.25), PValue::Tested(0.25));
        assert_eq!(PValue::Tested(0.03).to_stored(), 0.03);
    }

    #[test]
    fn untestable_has_no_value() {
        assert!(PValue::Untestable.is_untestable());
        assert_eq!(PValue::Untestable.value(), None);
        assert_eq!(PValue::Tested(0.5).value(), Some(0.5));
    }

    #[test]
    fn record_from_window_result_uses_canonical_order() {
        let result = WindowResult {
            pair: SymbolPair::new("ETH", "BTC").unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            window_size: 60,
            p_value: PValue::Tested(0.12),
        };
        let record = CointegrationRecord::from(result);
        assert_eq!(record.symbol_one, "BTC");
        assert_eq!(record.symbol_two, "ETH");
        assert_eq!(record.window_size, 60);
        assert_eq!(record.pair(), SymbolPair::new("BTC", "ETH"));
    }

    #[test]
    fn p_value_json_shape() {
        let json = serde_json::to_string(&PValue::Tested(0.5)).unwrap();
        assert_eq!(json, r#"{"kind":"tested","value":0.5}"#);
        let json = serde_json::to_string(&PValue::Untestable).unwrap();
        assert_eq!(json, r#"{"kind":"untestable"}"#);
    }
}
