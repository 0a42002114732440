//! The Burrows-Wheeler-transformed text plus the rank/occurrence structure
//! needed to do backward search over it.
//!
//! Grounded on the `Occ`/`less` design in `johanneskoester-rust-bio`'s
//! `data_structures::bwt` (checkpointed occurrence counts sampled every `k`
//! BWT positions, linearly scanned between checkpoints), adapted to the
//! seven-symbol alphabet of spec.md §3.

use crate::index::dna_text::ALPHABET_SIZE;

/// The Burrows-Wheeler transform of the indexed text, one encoded symbol per
/// byte.
#[derive(Clone, Debug)]
pub struct Bwt {
    bytes: Vec<u8>,
}

impl Bwt {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> u8 {
        self.bytes[i]
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

/// `Less[a]` = number of symbols in the text strictly smaller than `a`
/// (the "C array" of an FM-index).
#[derive(Clone, Debug)]
pub struct Less([usize; ALPHABET_SIZE]);

impl Less {
    #[must_use]
    pub fn new(bwt: &Bwt) -> Self {
        let mut counts = [0usize; ALPHABET_SIZE];
        for &c in bwt.as_slice() {
            counts[c as usize] += 1;
        }
        let mut less = [0usize; ALPHABET_SIZE];
        let mut acc = 0;
        for a in 0..ALPHABET_SIZE {
            less[a] = acc;
            acc += counts[a];
        }
        Self(less)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, a: u8) -> usize {
        self.0[a as usize]
    }
}

/// Checkpointed occurrence (rank) counts: `Occ.get(bwt, r, a)` is the number
/// of occurrences of symbol `a` in `bwt[0..=r]`, computed in O(k) by summing
/// a stored checkpoint with a linear scan over the remainder.
#[derive(Clone, Debug)]
pub struct Occ {
    checkpoints: Vec<[usize; ALPHABET_SIZE]>,
    k: usize,
}

impl Occ {
    /// `k` is the checkpoint sampling rate: every `k`-th BWT position gets a
    /// full count vector, trading memory for rescan length (spec.md §3
    /// "Rank m-table" accelerator plays a similar role one level up, over
    /// whole k-mers instead of single characters).
    #[must_use]
    pub fn new(bwt: &Bwt, k: usize) -> Self {
        let mut occ = Vec::with_capacity(bwt.len() / k + 1);
        let mut running = [0usize; ALPHABET_SIZE];
        occ.push(running);

        for (i, &c) in bwt.as_slice().iter().enumerate() {
            running[c as usize] += 1;
            if (i + 1) % k == 0 {
                occ.push(running);
            }
        }

        Occ { checkpoints: occ, k }
    }

    /// Occurrences of `a` in `bwt[0..=r]`. Returns 0 for `r` underflowing
    /// (i.e. an empty prefix).
    #[must_use]
    pub fn get(&self, bwt: &Bwt, r: usize, a: u8) -> usize {
        let checkpoint_idx = (r + 1) / self.k;
        let mut count = self.checkpoints[checkpoint_idx][a as usize];
        let checkpoint_pos = checkpoint_idx * self.k;
        for i in checkpoint_pos..=r {
            if bwt.get(i) == a {
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occ_matches_naive_count() {
        let bwt = Bwt::new(vec![0, 1, 0, 2, 1, 0, 3]);
        let occ = Occ::new(&bwt, 2);
        for r in 0..bwt.len() {
            for a in 0..ALPHABET_SIZE as u8 {
                let naive = bwt.as_slice()[..=r].iter().filter(|&&x| x == a).count();
                assert_eq!(occ.get(&bwt, r, a), naive, "r={r} a={a}");
            }
        }
    }

    #[test]
    fn less_is_cumulative_counts() {
        let bwt = Bwt::new(vec![0, 1, 0, 2, 1, 0, 3]);
        let less = Less::new(&bwt);
        assert_eq!(less.get(0), 0);
        assert_eq!(less.get(1), 3);
        assert_eq!(less.get(2), 5);
        assert_eq!(less.get(3), 6);
    }
}
