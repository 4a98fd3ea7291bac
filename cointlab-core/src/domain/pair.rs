//! Unordered symbol pairs with a canonical ordering.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An unordered pair of distinct symbols.
///
/// The two symbols are stored sorted, so `SymbolPair::new("B", "A")` and
/// `SymbolPair::new("A", "B")` are the same value and hash identically.
/// Storage uses the same order for `symbol_one` / `symbol_two`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolPair {
    first: String,
    second: String,
}

impl SymbolPair {
    /// Build the canonical pair. Returns `None` for a self-pair.
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Option<Self> {
        let a = a.into();
        let b = b.into();
        match a.cmp(&b) {
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Less => Some(Self { first: a, second: b }),
            std::cmp::Ordering::Greater => Some(Self { first: b, second: a }),
        }
    }

    /// Lexicographically smaller symbol (`symbol_one` in storage).
    pub fn first(&self) -> &str {
        &self.first
    }

    /// Lexicographically larger symbol (`symbol_two` in storage).
    pub fn second(&self) -> &str {
        &self.second
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.first == symbol || self.second == symbol
    }

    /// Parse `"A:B"` or `"A-B"` into a pair.
    pub fn parse(s: &str) -> Option<Self> {
        let (a, b) = s.split_once(':').or_else(|| s.split_once('-'))?;
        let (a, b) = (a.trim(), b.trim());
        if a.is_empty() || b.is_empty() {
            return None;
        }
        Self::new(a, b)
    }
}

impl fmt::Display for SymbolPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_canonical() {
        let ab = SymbolPair::new("ETH", "BTC").unwrap();
        assert_eq!(ab.first(), "BTC");
        assert_eq!(ab.second(), "ETH");
        assert_eq!(ab, SymbolPair::new("BTC", "ETH").unwrap());
    }

    #[test]
    fn self_pair_rejected() {
        assert!(SymbolPair::new("BTC", "BTC").is_none());
    }

    #[test]
    fn display_uses_canonical_order() {
        let pair = SymbolPair::new("SOL", "ADA").unwrap();
        assert_eq!(pair.to_string(), "ADA-SOL");
    }

    #[test]
    fn parse_accepts_colon_and_dash() {
        assert_eq!(
            SymbolPair::parse("ETH:BTC"),
            SymbolPair::new("BTC", "ETH")
        );
        assert_eq!(
            SymbolPair::parse("BTC-ETH"),
            SymbolPair::new("BTC", "ETH")
        );
        assert!(SymbolPair::parse("BTC").is_none());
        assert!(SymbolPair::parse("BTC:BTC").is_none());
        assert!(SymbolPair::parse(":ETH").is_none());
    }
}
