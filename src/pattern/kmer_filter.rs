//! Alphabet-indexed k-mer counting filter (spec.md §3 "k-mer counter",
//! §4.F.5.b).
//!
//! A cheap lower bound on edit distance: any edit destroys at most `k`
//! overlapping k-mers, so a candidate window sharing fewer k-mers with the
//! pattern than `total_kmers - max_error * k` cannot be within budget
//! (Ukkonen's counting-filter argument). Checked before the considerably
//! more expensive tiled BPM pass.

const K: usize = 3;
const NUM_KMERS: usize = 1 << (2 * K); // 64 canonical 3-mers

#[derive(Clone, Debug)]
pub struct KmerFilter {
    pattern_counts: [u16; NUM_KMERS],
    total_kmers: usize,
}

fn kmer_id(codes: &[u8]) -> Option<usize> {
    let mut id = 0usize;
    for &c in codes {
        if c as usize >= 4 {
            return None;
        }
        id = (id << 2) | c as usize;
    }
    Some(id)
}

/// Builds the counting profile for one pattern (encoded bases).
#[must_use]
pub fn build(key: &[u8]) -> KmerFilter {
    let mut pattern_counts = [0u16; NUM_KMERS];
    let mut total_kmers = 0usize;
    if key.len() >= K {
        for window in key.windows(K) {
            if let Some(id) = kmer_id(window) {
                pattern_counts[id] = pattern_counts[id].saturating_add(1);
                total_kmers += 1;
            }
        }
    }
    KmerFilter { pattern_counts, total_kmers }
}

impl KmerFilter {
    /// Lower bound on the edit distance between the compiled pattern and
    /// `text_window` (encoded bases), per `per_kmer_weight` = `K`.
    #[must_use]
    pub fn distance_lower_bound(&self, text_window: &[u8]) -> usize {
        if self.total_kmers == 0 || text_window.len() < K {
            return 0;
        }

        let mut text_counts = [0u16; NUM_KMERS];
        for window in text_window.windows(K) {
            if let Some(id) = kmer_id(window) {
                text_counts[id] = text_counts[id].saturating_add(1);
            }
        }

        let shared: usize = (0..NUM_KMERS).map(|id| self.pattern_counts[id].min(text_counts[id]) as usize).sum();
        let missing = self.total_kmers.saturating_sub(shared);
        missing.div_ceil(K)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::dna_text::Base;

    fn encode(s: &[u8]) -> Vec<u8> {
        s.iter().map(|&b| Base::from_ascii(b) as u8).collect()
    }

    #[test]
    fn identical_text_has_zero_lower_bound() {
        let key = encode(b"ACGTACGTACGT");
        let filter = build(&key);
        assert_eq!(filter.distance_lower_bound(&key), 0);
    }

    #[test]
    fn wildly_different_text_has_positive_lower_bound() {
        let key = encode(b"ACGTACGTACGT");
        let filter = build(&key);
        let unrelated = encode(b"TTTTTTTTTTTT");
        assert!(filter.distance_lower_bound(&unrelated) > 0);
    }
}
