//! Match scaffolding: the longest in-order chain of exact matching
//! sub-regions, used to seed and band the final SWG alignment (spec.md
//! §4.H).

/// One exact matching sub-region candidate, before chaining.
#[derive(Clone, Copy, Debug)]
pub struct ScaffoldCandidate {
    pub key_begin: usize,
    pub key_end: usize,
    pub text_begin: usize,
    pub text_end: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct ScaffoldRegion {
    pub key_begin: usize,
    pub key_end: usize,
    pub text_begin: usize,
    pub text_end: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Scaffold {
    pub regions: Vec<ScaffoldRegion>,
    /// Total matched key length covered by the chain.
    pub coverage: usize,
}

fn compatible(a: &ScaffoldCandidate, b: &ScaffoldCandidate) -> bool {
    a.key_end <= b.key_begin && a.text_end <= b.text_begin
}

/// Chains `candidates` via a longest-increasing-subsequence search over
/// (key, text) order, maximizing coverage (total matched key length) and
/// breaking ties toward the sparser-gapped, then the denser, chain, then
/// exact-extends every chained region to its neighbor's boundary.
///
/// Returns an empty, zero-coverage scaffold when `candidates` is empty;
/// callers should fall back to unscaffolded (full-band) SWG in that case.
#[must_use]
pub fn build_scaffold(candidates: &[ScaffoldCandidate], key: &[u8], text: &[u8]) -> Scaffold {
    if candidates.is_empty() {
        return Scaffold::default();
    }

    let mut sorted = candidates.to_vec();
    sorted.sort_by_key(|c| (c.text_begin, c.key_begin));
    let n = sorted.len();
    let coverage_of = |c: &ScaffoldCandidate| c.key_end - c.key_begin;

    let mut dp_cov = vec![0usize; n];
    let mut dp_sparse = vec![0usize; n];
    let mut dp_prev: Vec<Option<usize>> = vec![None; n];

    for i in 0..n {
        dp_cov[i] = coverage_of(&sorted[i]);
        dp_sparse[i] = 0;
        for j in 0..i {
            if !compatible(&sorted[j], &sorted[i]) {
                continue;
            }
            let gap = sorted[i].text_begin - sorted[j].text_end;
            let candidate_cov = dp_cov[j] + coverage_of(&sorted[i]);
            let candidate_sparse = dp_sparse[j] + gap;
            if candidate_cov > dp_cov[i] || (candidate_cov == dp_cov[i] && candidate_sparse < dp_sparse[i]) {
                dp_cov[i] = candidate_cov;
                dp_sparse[i] = candidate_sparse;
                dp_prev[i] = Some(j);
            }
        }
    }

    let mut best = 0;
    for i in 1..n {
        if dp_cov[i] > dp_cov[best] || (dp_cov[i] == dp_cov[best] && dp_sparse[i] < dp_sparse[best]) {
            best = i;
        }
    }

    let mut chain = Vec::new();
    let mut cursor = Some(best);
    while let Some(i) = cursor {
        chain.push(i);
        cursor = dp_prev[i];
    }
    chain.reverse();

    let mut regions: Vec<ScaffoldRegion> = Vec::with_capacity(chain.len());
    for (pos, &idx) in chain.iter().enumerate() {
        let mut c = sorted[idx];

        let (left_key_bound, left_text_bound) = regions.last().map_or((0, 0), |r: &ScaffoldRegion| (r.key_end, r.text_end));
        while c.key_begin > left_key_bound && c.text_begin > left_text_bound && key[c.key_begin - 1] == text[c.text_begin - 1] {
            c.key_begin -= 1;
            c.text_begin -= 1;
        }

        let (right_key_bound, right_text_bound) = chain
            .get(pos + 1)
            .map_or((key.len(), text.len()), |&next| (sorted[next].key_begin, sorted[next].text_begin));
        while c.key_end < right_key_bound && c.text_end < right_text_bound && key[c.key_end] == text[c.text_end] {
            c.key_end += 1;
            c.text_end += 1;
        }

        regions.push(ScaffoldRegion {
            key_begin: c.key_begin,
            key_end: c.key_end,
            text_begin: c.text_begin,
            text_end: c.text_end,
        });
    }

    let coverage = regions.iter().map(|r| r.key_end - r.key_begin).sum();
    Scaffold { regions, coverage }
}

/// Finds short exact-match seeds between `key` and `text` by sliding a
/// `min_seed_len`-wide window across `key` and scanning for it inside
/// `text`, restricted to the `+/- band` diagonal range around the window's
/// expected text position (spec.md §4.H: scaffold candidates come from
/// cheap exact matching, not from the index).
#[must_use]
pub fn find_exact_seeds(key: &[u8], text: &[u8], band: usize, min_seed_len: usize) -> Vec<ScaffoldCandidate> {
    let mut seeds = Vec::new();
    if min_seed_len == 0 || key.len() < min_seed_len {
        return seeds;
    }

    let mut key_begin = 0;
    while key_begin + min_seed_len <= key.len() {
        let window = &key[key_begin..key_begin + min_seed_len];
        let expected = key_begin;
        let lo = expected.saturating_sub(band);
        let hi = (expected + min_seed_len + band).min(text.len());

        let mut found = None;
        if hi > lo + min_seed_len {
            for text_begin in lo..=(hi - min_seed_len) {
                if &text[text_begin..text_begin + min_seed_len] == window {
                    found = Some(text_begin);
                    break;
                }
            }
        }

        if let Some(text_begin) = found {
            seeds.push(ScaffoldCandidate {
                key_begin,
                key_end: key_begin + min_seed_len,
                text_begin,
                text_end: text_begin + min_seed_len,
            });
            key_begin += min_seed_len;
        } else {
            key_begin += 1;
        }
    }

    seeds
}

/// Drops seeds that sit inside a homopolymer run in `key` which runs all
/// the way to within `min_context` bases of either end of the read (spec.md
/// §6 `homopolymer_min_context`): such a seed has no distinguishing
/// sequence flanking it on that side, so an exact match there is as likely
/// to be one indistinguishable copy of the run as the read's real origin.
#[must_use]
pub fn retain_non_homopolymer_seeds(key: &[u8], seeds: Vec<ScaffoldCandidate>, min_context: usize) -> Vec<ScaffoldCandidate> {
    if min_context == 0 {
        return seeds;
    }
    seeds.into_iter().filter(|c| !seed_buried_in_homopolymer(key, c, min_context)).collect()
}

fn seed_buried_in_homopolymer(key: &[u8], seed: &ScaffoldCandidate, min_context: usize) -> bool {
    let span = &key[seed.key_begin..seed.key_end];
    let Some(&base) = span.first() else {
        return false;
    };
    if span.len() < 2 || !span.iter().all(|&b| b == base) {
        return false;
    }

    let mut run_start = seed.key_begin;
    while run_start > 0 && key[run_start - 1] == base {
        run_start -= 1;
    }
    let mut run_end = seed.key_end;
    while run_end < key.len() && key[run_end] == base {
        run_end += 1;
    }

    run_start < min_context || key.len() - run_end < min_context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_candidates_yield_zero_coverage() {
        let scaffold = build_scaffold(&[], b"ACGT", b"ACGT");
        assert_eq!(scaffold.coverage, 0);
        assert!(scaffold.regions.is_empty());
    }

    #[test]
    fn chain_is_strictly_increasing_and_non_overlapping() {
        let key = b"ACGTACGTACGT";
        let text = b"ACGTACGTACGT";
        let candidates = vec![
            ScaffoldCandidate {
                key_begin:  0,
                key_end:    4,
                text_begin: 0,
                text_end:   4,
            },
            ScaffoldCandidate {
                key_begin:  8,
                key_end:    12,
                text_begin: 8,
                text_end:   12,
            },
        ];
        let scaffold = build_scaffold(&candidates, key, text);
        for pair in scaffold.regions.windows(2) {
            assert!(pair[0].key_end <= pair[1].key_begin);
            assert!(pair[0].text_end <= pair[1].text_begin);
        }
    }

    #[test]
    fn exact_extension_grows_regions_to_neighbor_boundary() {
        let key = b"ACGTACGTACGT";
        let text = b"ACGTACGTACGT";
        let candidates = vec![ScaffoldCandidate {
            key_begin:  4,
            key_end:    6,
            text_begin: 4,
            text_end:   6,
        }];
        let scaffold = build_scaffold(&candidates, key, text);
        assert_eq!(scaffold.regions.len(), 1);
        assert_eq!(scaffold.regions[0].key_begin, 0);
        assert_eq!(scaffold.regions[0].key_end, 12);
    }

    #[test]
    fn favors_higher_coverage_chain_over_denser_shorter_one() {
        let key = b"AAAACCCCGGGG";
        let text = b"AAAACCCCGGGG";
        let candidates = vec![
            ScaffoldCandidate {
                key_begin:  0,
                key_end:    4,
                text_begin: 0,
                text_end:   4,
            },
            ScaffoldCandidate {
                key_begin:  4,
                key_end:    8,
                text_begin: 4,
                text_end:   8,
            },
            ScaffoldCandidate {
                key_begin:  8,
                key_end:    12,
                text_begin: 8,
                text_end:   12,
            },
            // Overlaps with the middle candidate; lower total coverage if chosen instead.
            ScaffoldCandidate {
                key_begin:  3,
                key_end:    9,
                text_begin: 3,
                text_end:   9,
            },
        ];
        let scaffold = build_scaffold(&candidates, key, text);
        assert_eq!(scaffold.coverage, 12);
    }

    #[test]
    fn retain_non_homopolymer_seeds_drops_runs_flush_against_the_read_end() {
        let key = b"AAAAACGTACGT";
        let seeds = vec![ScaffoldCandidate {
            key_begin:  0,
            key_end:    5,
            text_begin: 0,
            text_end:   5,
        }];
        let retained = retain_non_homopolymer_seeds(key, seeds, 3);
        assert!(retained.is_empty());
    }

    #[test]
    fn retain_non_homopolymer_seeds_keeps_runs_with_enough_flanking_context() {
        let key = b"ACGTACGTAAAACGTACGT";
        let seeds = vec![ScaffoldCandidate {
            key_begin:  8,
            key_end:    12,
            text_begin: 8,
            text_end:   12,
        }];
        let retained = retain_non_homopolymer_seeds(key, seeds, 3);
        assert_eq!(retained.len(), 1);
    }

    #[test]
    fn find_exact_seeds_locates_matching_windows() {
        let key = b"ACGTACGTACGT";
        let text = b"TTTACGTACGTACGTTTT";
        let seeds = find_exact_seeds(key, text, 2, 4);
        assert!(!seeds.is_empty());
        for seed in &seeds {
            assert_eq!(&key[seed.key_begin..seed.key_end], &text[seed.text_begin..seed.text_end]);
        }
    }
}
