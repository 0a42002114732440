//! Bounded edit-distance enumeration of BWT intervals for one region
//! (spec.md §4.D).
//!
//! Walks the region backward through the index exactly like
//! [`crate::index::Index::interval_search`], except at every step it
//! branches over all four canonical bases instead of following just the
//! one dictated by the read, maintaining a rolling edit-distance column
//! (the "DP-matrix representation restricted to the edit band") and
//! pruning any branch whose column minimum exceeds the error budget.

use crate::index::Index;
use crate::index::dna_text::{Base, CANONICAL_SIZE};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NsHit {
    pub lo: usize,
    pub hi: usize,
    pub distance: usize,
}

/// Enumerates every BWT interval reachable by extending `epsilon` or fewer
/// edits away from `key[begin..end]`.
///
/// Distances are computed over insertions, deletions and substitutions;
/// `key` must already be the encoded (not ASCII) pattern. Returns one
/// [`NsHit`] per depth at which the column's final entry (full region
/// length matched) is within budget; a region may therefore contribute
/// several hits at different depths (ins/del shift the matched text
/// length relative to the pattern).
#[must_use]
pub fn neighborhood_search(index: &Index, key: &[u8], begin: usize, end: usize, epsilon: usize) -> Vec<NsHit> {
    if epsilon == 0 {
        // Degenerate case: identical to exact search, but phrased through
        // the same recursive walker so callers get a uniform interface.
        return match index.interval_search_codes(&key[begin..end]) {
            Some((lo, hi)) if lo < hi => vec![NsHit { lo, hi, distance: 0 }],
            _ => Vec::new(),
        };
    }

    let region: Vec<u8> = key[begin..end].iter().rev().copied().collect();
    let n = region.len();
    let max_depth = n + epsilon;
    let initial_column: Vec<usize> = (0..=n).collect();

    let mut results = Vec::new();
    let whole = (0, index.bwt_len());
    recurse(index, &region, epsilon, max_depth, whole, &initial_column, 0, &mut results);
    results
}

#[allow(clippy::too_many_arguments)]
fn recurse(index: &Index, region: &[u8], epsilon: usize, max_depth: usize, interval: (usize, usize), column: &[usize], depth: usize, results: &mut Vec<NsHit>) {
    let n = region.len();
    if depth > 0 {
        let final_distance = column[n];
        if final_distance <= epsilon {
            results.push(NsHit {
                lo: interval.0,
                hi: interval.1,
                distance: final_distance,
            });
        }
    }

    if depth >= max_depth || interval.0 >= interval.1 {
        return;
    }

    for code in 0..CANONICAL_SIZE as u8 {
        let symbol = Base::from_code(code);
        let new_interval = index.interval_extend(interval, symbol);
        if new_interval.0 >= new_interval.1 {
            continue;
        }

        let mut new_column = vec![0usize; n + 1];
        new_column[0] = depth + 1;
        let mut min_val = new_column[0];
        for i in 1..=n {
            let sub_cost = usize::from(region[i - 1] != code);
            let v = (column[i - 1] + sub_cost).min(column[i] + 1).min(new_column[i - 1] + 1);
            new_column[i] = v;
            min_val = min_val.min(v);
        }

        if min_val > epsilon {
            continue;
        }
        recurse(index, region, epsilon, max_depth, new_interval, &new_column, depth + 1, results);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::builder::build_index;
    use crate::io::fastx::FastX;

    fn toy_index() -> Index {
        let records = vec![FastX {
            header:   "chr1".into(),
            sequence: b"ACGTACGTTTGGCC".to_vec(),
            quality:  None,
        }];
        build_index(&records, false)
    }

    fn encode(s: &[u8]) -> Vec<u8> {
        s.iter().map(|&b| Base::from_ascii(b) as u8).collect()
    }

    #[test]
    fn zero_budget_matches_exact_search() {
        let index = toy_index();
        let key = encode(b"TTGG");
        let hits = neighborhood_search(&index, &key, 0, key.len(), 0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].distance, 0);
        assert_eq!(hits[0].hi - hits[0].lo, 1);
    }

    #[test]
    fn one_substitution_is_found_within_budget() {
        let index = toy_index();
        // "TTCG" is one substitution away from "TTGG" which occurs at offset 8.
        let key = encode(b"TTCG");
        let hits = neighborhood_search(&index, &key, 0, key.len(), 1);
        assert!(hits.iter().any(|h| h.distance <= 1 && h.hi > h.lo));
    }

    #[test]
    fn absent_pattern_yields_nothing_within_small_budget() {
        let index = toy_index();
        let key = encode(b"AAAAAAAA");
        let hits = neighborhood_search(&index, &key, 0, key.len(), 1);
        assert!(hits.is_empty());
    }
}
