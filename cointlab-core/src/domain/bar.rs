//! Market bars and the close-only price points derived from them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily kline for a single symbol, as delivered by the exchange export.
///
/// Only `close` feeds the cointegration engine; the remaining columns are
/// carried so the market data table keeps the full kline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: NaiveDate,
    pub quote_volume: f64,
    pub trades: u64,
    pub taker_base_volume: f64,
    pub taker_quote_volume: f64,
}

impl MarketBar {
    /// Returns true if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low and every price strictly positive.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.open > 0.0
            && self.high > 0.0
            && self.low > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
    }

    pub fn price_point(&self) -> PricePoint {
        PricePoint {
            date: self.date,
            symbol: self.symbol.clone(),
            close: self.close,
        }
    }
}

/// One close per (symbol, date). The unit of the input panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub symbol: String,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, symbol: impl Into<String>, close: f64) -> Self {
        Self {
            date,
            symbol: symbol.into(),
            close,
        }
    }
}
