//! Precomputed multi-character rank lookups (spec.md §3 "Rank m-table").
//!
//! A pure accelerator: for every canonical k-mer of length
//! `min_matching_depth`, the BWT interval after searching it backward is
//! precomputed once at index-load time, so [`crate::index::Index::interval_search`]
//! can start a query already `min_matching_depth` characters deep instead of
//! walking them one at a time.

use crate::index::bwt::{Bwt, Less, Occ};
use crate::index::dna_text::CANONICAL_SIZE;

#[derive(Clone, Debug)]
pub struct RankMTable {
    depth: usize,
    /// Indexed by the base-4 value of the k-mer (most significant character
    /// first); entry is `(lo, hi)`.
    table: Vec<(usize, usize)>,
}

impl RankMTable {
    /// `depth = 0` degenerates to a table with a single entry spanning the
    /// whole BWT, which callers should treat as "no skip available".
    #[must_use]
    pub fn build(bwt: &Bwt, occ: &Occ, less: &Less, depth: usize) -> Self {
        if depth == 0 {
            return Self {
                depth: 0,
                table: vec![(0, bwt.len())],
            };
        }

        let num_entries = CANONICAL_SIZE.pow(depth as u32);
        let mut table = vec![(0usize, 0usize); num_entries];

        for (idx, slot) in table.iter_mut().enumerate() {
            let mut lo = 0usize;
            let mut hi = bwt.len();
            // Characters are consumed most-significant-first, which backward
            // search consumes last, matching interval_search's right-to-left
            // walk over the key.
            for i in 0..depth {
                let shift = (depth - 1 - i) * 2;
                let c = ((idx >> shift) & 0b11) as u8;
                lo = less.get(c) + if lo > 0 { occ.get(bwt, lo - 1, c) } else { 0 };
                hi = less.get(c) + if hi > 0 { occ.get(bwt, hi - 1, c) } else { 0 };
                if lo >= hi {
                    break;
                }
            }
            *slot = (lo, hi);
        }

        Self { depth, table }
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Looks up the interval for a canonical k-mer (`suffix`, the last
    /// `depth` characters of the search key, most-significant-first, i.e.
    /// `suffix[0]` is the character searched first).
    ///
    /// Returns `None` when any character is non-canonical (the accelerator
    /// only covers `{A,C,G,T}`; callers fall back to one-at-a-time search).
    #[must_use]
    pub fn lookup(&self, suffix: &[u8]) -> Option<(usize, usize)> {
        if self.depth == 0 || suffix.len() != self.depth {
            return None;
        }
        let mut idx = 0usize;
        for &c in suffix {
            if c as usize >= CANONICAL_SIZE {
                return None;
            }
            idx = (idx << 2) | c as usize;
        }
        self.table.get(idx).copied()
    }

    /// Decomposes into raw parts for [`crate::index::persist`] serialization.
    #[must_use]
    pub fn into_raw_parts(self) -> (usize, Vec<(usize, usize)>) {
        (self.depth, self.table)
    }

    #[must_use]
    pub fn from_raw_parts(depth: usize, table: Vec<(usize, usize)>) -> Self {
        Self { depth, table }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::dna_text::Base;

    #[test]
    fn zero_depth_spans_whole_bwt() {
        let bwt = Bwt::new(vec![0, 1, 2, 3]);
        let less = Less::new(&bwt);
        let occ = Occ::new(&bwt, 2);
        let table = RankMTable::build(&bwt, &occ, &less, 0);
        assert_eq!(table.lookup(&[]), None);
        assert_eq!(table.table[0], (0, bwt.len()));
    }

    #[test]
    fn depth_one_matches_manual_backward_search_step() {
        let bwt = Bwt::new(vec![3, 1, 0, 2, 1, 0, 0]);
        let less = Less::new(&bwt);
        let occ = Occ::new(&bwt, 2);
        let table = RankMTable::build(&bwt, &occ, &less, 1);

        for c in 0..CANONICAL_SIZE as u8 {
            let lo = less.get(c);
            let hi = less.get(c) + occ.get(&bwt, bwt.len() - 1, c);
            assert_eq!(table.lookup(&[c]), Some((lo, hi)));
        }
        assert_eq!(table.lookup(&[Base::N as u8]), None);
    }
}
