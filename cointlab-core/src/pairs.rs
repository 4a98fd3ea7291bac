//! Pair enumeration over two symbol groups.

use std::collections::HashSet;

use crate::domain::SymbolPair;

/// Every unordered pair from `group1 × group2`, in first-occurrence order.
///
/// Self-pairs are dropped, and a pair already emitted in either order is not
/// emitted again. Symbols are not validated here.
pub fn enumerate_pairs<A, B>(group1: &[A], group2: &[B]) -> Vec<SymbolPair>
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let mut seen: HashSet<SymbolPair> = HashSet::new();
    let mut pairs = Vec::new();
    for a in group1 {
        for b in group2 {
            let Some(pair) = SymbolPair::new(a.as_ref(), b.as_ref()) else {
                continue;
            };
            if seen.insert(pair.clone()) {
                pairs.push(pair);
            }
        }
    }
    pairs
}

/// Distinct symbols referenced by a pair list, sorted.
pub fn symbols_of(pairs: &[SymbolPair]) -> Vec<String> {
    let mut symbols: Vec<String> = pairs
        .iter()
        .flat_map(|p| [p.first().to_string(), p.second().to_string()])
        .collect();
    symbols.sort();
    symbols.dedup();
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reversed_groups_yield_one_pair() {
        let pairs = enumerate_pairs(&["A", "B"], &["B", "A"]);
        assert_eq!(pairs, vec![SymbolPair::new("A", "B").unwrap()]);
    }

    #[test]
    fn disjoint_groups_give_full_product() {
        let pairs = enumerate_pairs(&["BTC", "ETH"], &["SOL", "ADA", "XRP"]);
        assert_eq!(pairs.len(), 6);
        assert_eq!(pairs[0], SymbolPair::new("BTC", "SOL").unwrap());
        assert_eq!(pairs[1], SymbolPair::new("ADA", "BTC").unwrap());
    }

    #[test]
    fn identical_groups_give_combinations() {
        let group = ["A", "B", "C", "D"];
        assert_eq!(enumerate_pairs(&group, &group).len(), 6);
    }

    #[test]
    fn empty_group_gives_nothing() {
        let empty: [&str; 0] = [];
        assert!(enumerate_pairs(&empty, &["A"]).is_empty());
        assert!(enumerate_pairs(&["A"], &empty).is_empty());
    }

    #[test]
    fn symbols_of_is_sorted_and_distinct() {
        let pairs = enumerate_pairs(&["ETH", "BTC"], &["SOL", "BTC"]);
        assert_eq!(symbols_of(&pairs), vec!["BTC", "ETH", "SOL"]);
    }

    proptest! {
        #[test]
        fn no_self_pairs_and_no_duplicates(
            g1 in prop::collection::vec("[A-E]", 0..8),
            g2 in prop::collection::vec("[A-E]", 0..8),
        ) {
            let pairs = enumerate_pairs(&g1, &g2);
            let unique: HashSet<_> = pairs.iter().cloned().collect();
            prop_assert_eq!(unique.len(), pairs.len());
            for pair in &pairs {
                prop_assert_ne!(pair.first(), pair.second());
                prop_assert!(pair.first() < pair.second());
            }
        }

        #[test]
        fn order_of_groups_does_not_change_the_set(
            g1 in prop::collection::vec("[A-F]", 0..6),
            g2 in prop::collection::vec("[A-F]", 0..6),
        ) {
            let forward: HashSet<_> = enumerate_pairs(&g1, &g2).into_iter().collect();
            let backward: HashSet<_> = enumerate_pairs(&g2, &g1).into_iter().collect();
            prop_assert_eq!(forward, backward);
        }
    }
}
