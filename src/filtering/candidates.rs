//! Candidate generation: projects region-profile hits into candidate text
//! windows, verifies them cheaply, and hands the survivors to scaffolding
//! (spec.md §4.F).

use crate::filtering::bpm_verify;
use crate::filtering::scaffold::{self, ScaffoldCandidate};
use crate::index::Index;
use crate::pattern::Pattern;

/// One not-yet-decoded SA rank, tagged with the region offset needed to
/// project its decoded text position back to the start of the whole
/// pattern (spec.md §4.F.1 "add candidates").
struct PendingRank {
    rank: usize,
    /// `region.begin`: the matched region's offset into the pattern, so the
    /// decoded occurrence (which marks where the region itself starts in
    /// the text) can be shifted back to where the whole pattern would
    /// start if there were no indels upstream of the region.
    region_begin: usize,
}

/// Accumulates pending SA ranks across every queried region before doing
/// one batched decode (spec.md §4.F: "decode ranks are batched across all
/// regions of a read, not resolved per region").
#[derive(Default)]
pub struct CandidateGenerator {
    pending: Vec<PendingRank>,
}

impl CandidateGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every rank in `interval` as a pending candidate anchored at
    /// `region_begin`.
    pub fn add_interval(&mut self, interval: (usize, usize), region_begin: usize) {
        for rank in interval.0..interval.1 {
            self.pending.push(PendingRank { rank, region_begin });
        }
    }

    pub fn add_interval_set(&mut self, intervals: &[((usize, usize), usize)]) {
        for &(interval, region_begin) in intervals {
            self.add_interval(interval, region_begin);
        }
    }

    /// Same as [`CandidateGenerator::add_interval_set`] but skips any
    /// interval wider than `max_positions_per_region`: an over-wide
    /// interval means the region is too repetitive to be informative, and
    /// decoding every occurrence would dominate the read's cost (spec.md
    /// §4.F: regions above the repetitiveness threshold contribute no
    /// candidates).
    pub fn add_interval_set_thresholded(&mut self, intervals: &[((usize, usize), usize)], max_positions_per_region: usize) {
        for &(interval, region_begin) in intervals {
            if interval.1 - interval.0 > max_positions_per_region {
                continue;
            }
            self.add_interval(interval, region_begin);
        }
    }

    #[must_use]
    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }

    /// Batch-decodes every pending rank and projects it to an estimated
    /// whole-pattern window `[begin_position, end_position)`, padded by
    /// `max_bandwidth` on both sides to absorb indels (spec.md §4.F.2
    /// "decode filtering positions").
    #[must_use]
    pub fn decode_filtering_positions(&self, index: &Index, key_len: usize, max_bandwidth: usize) -> Vec<CandidatePosition> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let ranks: Vec<usize> = self.pending.iter().map(|p| p.rank).collect();
        let decoded = index.decode_ranks(&ranks);

        let mut positions: Vec<CandidatePosition> = decoded
            .iter()
            .zip(self.pending.iter())
            .map(|(&pos, pending)| {
                let anchor = pos.saturating_sub(pending.region_begin);
                let begin_position = anchor.saturating_sub(max_bandwidth);
                let end_position = anchor + key_len + max_bandwidth;
                CandidatePosition {
                    begin_position,
                    end_position,
                    anchor,
                }
            })
            .collect();
        positions.sort_by_key(|p| p.begin_position);
        positions
    }
}

/// One candidate window in text coordinates, before grouping.
#[derive(Clone, Copy, Debug)]
pub struct CandidatePosition {
    pub begin_position: usize,
    pub end_position: usize,
    pub anchor: usize,
}

/// A candidate window grouped from one or more overlapping
/// [`CandidatePosition`]s on the same sequence (spec.md §4.F.3 "compose
/// regions").
#[derive(Clone, Debug)]
pub struct CandidateRegion {
    pub sequence_name: String,
    pub begin_position: usize,
    pub end_position: usize,
    pub num_supporting_positions: usize,
}

/// Merges overlapping `[begin_position, end_position)` windows that resolve
/// to the same sequence name, discarding any position the locator cannot
/// resolve (e.g. a separator).
#[must_use]
pub fn compose_regions(index: &Index, positions: &[CandidatePosition]) -> Vec<CandidateRegion> {
    let mut tagged: Vec<(String, usize, usize)> = Vec::with_capacity(positions.len());
    for p in positions {
        if let Ok((name, offset, ..)) = index.locate(p.anchor) {
            let span = p.end_position - p.begin_position;
            let local_begin = offset.saturating_sub(p.anchor - p.begin_position);
            tagged.push((name.to_string(), local_begin, local_begin + span));
        }
    }
    tagged.sort_by(|a, b| (a.0.clone(), a.1).cmp(&(b.0.clone(), b.1)));

    let mut regions: Vec<CandidateRegion> = Vec::new();
    for (name, begin, end) in tagged {
        if let Some(last) = regions.last_mut() {
            if last.sequence_name == name && begin <= last.end_position {
                last.end_position = last.end_position.max(end);
                last.num_supporting_positions += 1;
                continue;
            }
        }
        regions.push(CandidateRegion {
            sequence_name: name,
            begin_position: begin,
            end_position: end,
            num_supporting_positions: 1,
        });
    }
    regions
}

/// Drops any composed region fully contained in an already-discarded range
/// (spec.md §4.F.5). This is a simplification of the full `verified_ranges`
/// cache: it remembers only ranges already rejected, not ranges already
/// confirmed, since re-verifying an already-confirmed region merely wastes
/// work rather than risking correctness, while skipping a range this read
/// has already proven unviable is a meaningful saving at negligible
/// complexity.
#[must_use]
pub fn prefilter_discarded(regions: Vec<CandidateRegion>, discarded_ranges: &[(usize, usize)]) -> Vec<CandidateRegion> {
    regions
        .into_iter()
        .filter(|region| !discarded_ranges.iter().any(|&(d_begin, d_end)| region.begin_position >= d_begin && region.end_position <= d_end))
        .collect()
}

/// Runs k-mer-filter then tiled-BPM verification against the actual text
/// bytes for one candidate window, discarding (and recording into
/// `discarded_ranges`) any window the k-mer filter or BPM verifier rules
/// out.
#[must_use]
pub fn verify_one_window(pattern: &Pattern, text_window: &[u8], max_effective_error: usize, discarded_ranges: &mut Vec<(usize, usize)>, window_begin: usize, window_end: usize) -> Option<usize> {
    if let Some(kmers) = &pattern.kmer_filter {
        if kmers.distance_lower_bound(text_window) > max_effective_error {
            discarded_ranges.push((window_begin, window_end));
            return None;
        }
    }

    if let Some(bpm) = &pattern.bpm_pattern {
        match bpm_verify::verify(bpm, text_window, max_effective_error) {
            Some(result) => Some(result.align_distance),
            None => {
                discarded_ranges.push((window_begin, window_end));
                None
            }
        }
    } else {
        // exact_only patterns: any exact occurrence has distance zero.
        Some(0)
    }
}

/// Builds scaffold candidates for one verified window via a banded exact-
/// seed scan, chains them, and returns the scaffold chain ready for SWG
/// alignment (spec.md §4.H). Seeds buried inside a homopolymer run with
/// fewer than `homopolymer_min_context` bases of flanking non-repetitive
/// sequence are dropped before chaining (spec.md §6
/// `homopolymer_min_context`).
#[must_use]
pub fn scaffold_window(key: &[u8], text_window: &[u8], band: usize, min_seed_len: usize, homopolymer_min_context: usize) -> Vec<ScaffoldCandidate> {
    let seeds = scaffold::find_exact_seeds(key, text_window, band, min_seed_len);
    scaffold::retain_non_homopolymer_seeds(key, seeds, homopolymer_min_context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::builder::build_index;
    use crate::index::dna_text::Base;
    use crate::io::fastx::FastX;

    fn toy_index() -> Index {
        let records = vec![FastX {
            header:   "chr1".into(),
            sequence: b"TTTTACGTACGTACGTTTTTGGGGCCCCAAAA".to_vec(),
            quality:  None,
        }];
        build_index(&records, false)
    }

    fn encode(s: &[u8]) -> Vec<u8> {
        s.iter().map(|&b| Base::from_ascii(b) as u8).collect()
    }

    #[test]
    fn add_interval_set_thresholded_skips_overly_wide_intervals() {
        let mut gen = CandidateGenerator::new();
        gen.add_interval_set_thresholded(&[((0, 100), 0), ((0, 2), 4)], 10);
        assert_eq!(gen.num_pending(), 2);
    }

    #[test]
    fn decode_filtering_positions_projects_by_region_begin() {
        let index = toy_index();
        let key = encode(b"ACGTACGTACGT");
        let region_key = &key[4..]; // region covering key[4..12]
        let interval = index.interval_search_codes(region_key).unwrap();

        let mut gen = CandidateGenerator::new();
        gen.add_interval(interval, 4);
        let positions = gen.decode_filtering_positions(&index, key.len(), 2);
        assert!(!positions.is_empty());
        for p in &positions {
            assert!(p.begin_position <= p.anchor);
            assert!(p.end_position >= p.anchor);
        }
    }

    #[test]
    fn compose_regions_merges_overlapping_windows_on_same_sequence() {
        let index = toy_index();
        let positions = vec![
            CandidatePosition {
                begin_position: 2,
                end_position:   10,
                anchor:         4,
            },
            CandidatePosition {
                begin_position: 6,
                end_position:   14,
                anchor:         8,
            },
        ];
        let regions = compose_regions(&index, &positions);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].num_supporting_positions, 2);
    }
}
