//! The FM-index façade (spec.md §4.A).
//!
//! Unifies the encoded text, BWT/rank structures, sampled suffix array, rank
//! m-table accelerator and locator behind the four operations the rest of
//! the pipeline calls: `interval_search`, `interval_extend`,
//! `decode_positions`, `locate`. Grounded on the `FMIndex`/`FMIndexable`
//! split in `johanneskoester-rust-bio`'s `data_structures::fmindex`, adapted
//! to this crate's seven-symbol alphabet and sampled (rather than full) SA.

pub mod builder;
pub mod bwt;
pub mod dna_text;
pub mod locator;
pub mod persist;
pub mod rank_mtable;
pub mod suffix_array;

use bwt::{Bwt, Less, Occ};
use dna_text::{Base, EncodedText};
pub use locator::{BsStrand, Locator, LocatorError, Strand};
use rank_mtable::RankMTable;
use suffix_array::SampledSuffixArray;

/// A half-open `[lo, hi)` range of suffix-array ranks, all of whose suffixes
/// share the searched-for prefix. An empty interval (`lo == hi`) means no
/// match.
pub type Interval = (usize, usize);

#[derive(Clone, Debug)]
pub struct Index {
    text: EncodedText,
    bwt: Bwt,
    less: Less,
    occ: Occ,
    sampled_sa: SampledSuffixArray,
    rank_mtable: RankMTable,
    locator: Locator,
}

impl Index {
    /// Builds every derived structure (BWT, Less/Occ, sampled SA, rank
    /// m-table) from an already-concatenated encoded text. Suffix sorting is
    /// done with the standard library's comparison sort; see
    /// [`crate::index::builder`] for why that is acceptable only for small
    /// demo references.
    #[must_use]
    pub fn from_text(text: EncodedText, locator: Locator, occ_checkpoint: usize, sa_sampling_rate: usize, rank_mtable_depth: usize) -> Self {
        let codes = text.raw();
        let mut sa: Vec<usize> = (0..codes.len()).collect();
        sa.sort_by(|&a, &b| codes[a..].cmp(&codes[b..]));

        let bwt_bytes: Vec<u8> = sa.iter().map(|&pos| codes[(pos + codes.len() - 1) % codes.len()]).collect();
        let bwt = Bwt::new(bwt_bytes);
        let less = Less::new(&bwt);
        let occ = Occ::new(&bwt, occ_checkpoint.max(1));
        let sampled_sa = SampledSuffixArray::from_full_sa(&sa, sa_sampling_rate.max(1));
        let rank_mtable = RankMTable::build(&bwt, &occ, &less, rank_mtable_depth);

        Self {
            text,
            bwt,
            less,
            occ,
            sampled_sa,
            rank_mtable,
            locator,
        }
    }

    #[must_use]
    pub fn text_len(&self) -> usize {
        self.text.len()
    }

    #[must_use]
    pub fn num_sequences(&self) -> usize {
        self.locator.num_sequences()
    }

    #[inline]
    #[must_use]
    pub fn bwt_len(&self) -> usize {
        self.bwt.len()
    }

    /// One backward-search step: narrows `interval` to the suffixes that are
    /// additionally preceded by `symbol` (spec.md §4.A `interval_extend`).
    #[must_use]
    pub fn interval_extend(&self, interval: Interval, symbol: Base) -> Interval {
        let c = symbol as u8;
        let (lo, hi) = interval;
        let new_lo = self.less.get(c) + if lo > 0 { self.occ.get(&self.bwt, lo - 1, c) } else { 0 };
        let new_hi = self.less.get(c) + if hi > 0 { self.occ.get(&self.bwt, hi - 1, c) } else { 0 };
        (new_lo, new_hi)
    }

    /// Full backward search for `pattern` (ASCII bases), using the rank
    /// m-table to skip the first `rank_mtable.depth()` characters when the
    /// pattern is long enough and every skipped character is canonical.
    ///
    /// Returns `None` when the pattern does not occur.
    #[must_use]
    pub fn interval_search(&self, pattern: &[u8]) -> Option<Interval> {
        let codes: Vec<u8> = pattern.iter().map(|&b| Base::from_ascii(b) as u8).collect();
        self.interval_search_codes(&codes)
    }

    /// Same as [`Index::interval_search`] but `codes` are already encoded
    /// (each byte a [`Base`] discriminant), for callers such as
    /// [`crate::neighborhood_search`] that build keys from an already
    /// encoded [`crate::pattern::Pattern`].
    #[must_use]
    pub fn interval_search_codes(&self, codes: &[u8]) -> Option<Interval> {
        if codes.is_empty() {
            return Some((0, self.bwt.len()));
        }

        let depth = self.rank_mtable.depth();

        let (mut interval, consumed) = if depth > 0 && codes.len() >= depth {
            let suffix = &codes[codes.len() - depth..];
            match self.rank_mtable.lookup(suffix) {
                Some(iv) => (iv, depth),
                None => ((0, self.bwt.len()), 0),
            }
        } else {
            ((0, self.bwt.len()), 0)
        };

        if interval.0 >= interval.1 {
            return None;
        }

        for &c in codes[..codes.len() - consumed].iter().rev() {
            interval = self.interval_extend(interval, Base::from_code(c));
            if interval.0 >= interval.1 {
                return None;
            }
        }

        Some(interval)
    }

    /// Decodes every SA rank in `interval` to a text position (spec.md
    /// §4.E), dispatching to the batched/interleaved path for wide
    /// intervals.
    #[must_use]
    pub fn decode_positions(&self, interval: &Interval) -> Vec<usize> {
        let ranks: Vec<usize> = (interval.0..interval.1).collect();
        suffix_array::decode_positions(&self.bwt, &self.occ, &self.less, &self.sampled_sa, &ranks)
    }

    /// Decodes an arbitrary, possibly non-contiguous, list of SA ranks
    /// (spec.md §4.F: candidate generation collects ranks from many
    /// disjoint region intervals before a single batched decode).
    #[must_use]
    pub fn decode_ranks(&self, ranks: &[usize]) -> Vec<usize> {
        suffix_array::decode_positions(&self.bwt, &self.occ, &self.less, &self.sampled_sa, ranks)
    }

    /// Resolves a text position to `(sequence_name, local_offset, strand,
    /// bs_strand)` (spec.md §4.A.4).
    pub fn locate(&self, text_position: usize) -> Result<(&str, usize, Strand, BsStrand), LocatorError> {
        self.locator.locate(text_position)
    }

    #[must_use]
    pub fn encoded_text(&self) -> &EncodedText {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::locator::SequenceSpan;

    fn toy_index() -> Index {
        let mut text = EncodedText::new();
        text.push_ascii(b"ACGTACGTTTGGCC");
        text.push_base(Base::Sep);
        let forward_block_len = text.len();
        let locator = Locator::new(
            vec![SequenceSpan {
                name:   "toy".into(),
                start:  0,
                length: 14,
            }],
            forward_block_len,
            false,
        );
        Index::from_text(text, locator, 4, 2, 0)
    }

    #[test]
    fn interval_search_finds_unique_substring() {
        let index = toy_index();
        let interval = index.interval_search(b"TTGG").unwrap();
        assert_eq!(interval.1 - interval.0, 1);
        let positions = index.decode_positions(&interval);
        assert_eq!(positions, vec![6]);
    }

    #[test]
    fn interval_search_returns_none_for_absent_pattern() {
        let index = toy_index();
        assert!(index.interval_search(b"GGGGGGGG").is_none());
    }

    #[test]
    fn interval_extend_matches_full_search_incrementally() {
        let index = toy_index();
        let mut interval = (0, index.text_len());
        for &c in [Base::G, Base::G, Base::T, Base::T].iter() {
            interval = index.interval_extend(interval, c);
        }
        let full = index.interval_search(b"TTGG").unwrap();
        assert_eq!(interval, full);
    }
}
