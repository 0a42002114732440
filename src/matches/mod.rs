//! Match traces: one reported alignment per read, plus the store that
//! dedups, ranks, and MAPQ-scores every trace a search produced (spec.md
//! §3 "Match trace", §4.J).

use crate::align::{Cigar, CigarOp};
use crate::index::{BsStrand, Strand};
use crate::utils::SeedableFoldHashMap;

/// How a read's best match(es) compare to the rest of the search space
/// (spec.md §4.J "classify": one of {unmapped, unique, mmap,
/// tie_indistinguishable, tie_swg_score, tie_edit_distance,
/// tie_event_distance}).
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum MatchClass {
    /// No trace survived verification/alignment.
    Unmapped,
    /// A single trace, or several traces with a strictly better best.
    Unique,
    /// Several traces, best one strictly ahead by `swg_score` but the read
    /// still maps to more than one place overall.
    Mmap,
    /// Best `swg_score` is shared by ≥2 traces, distinguishable only by
    /// `edit_distance` (lower wins).
    TieSwgScore,
    /// Best `swg_score` and `edit_distance` are shared, distinguishable
    /// only by `event_distance` (lower wins).
    TieEditDistance,
    /// Best `swg_score`, `edit_distance`, and `event_distance` are all
    /// shared, but the tied traces' CIGARs differ.
    TieEventDistance,
    /// Best `swg_score`, `edit_distance`, `event_distance`, and CIGAR are
    /// all identical between the tied traces — nothing but position
    /// distinguishes them (spec.md scenario S5: two identical repeated
    /// 30-mers).
    TieIndistinguishable,
}

/// One alignment a search produced for a read (spec.md §3).
#[derive(Clone, Debug)]
pub struct MatchTrace {
    pub strand: Strand,
    pub bs_strand: BsStrand,
    pub sequence_name: String,
    /// 0-based offset of the alignment's first reference base.
    pub text_position: usize,
    pub cigar: Cigar,
    pub swg_score: i64,
    pub edit_distance: usize,
    /// Count of discrete edit events the CIGAR represents (spec.md §3
    /// "distance (event)"); see [`Cigar::event_distance`].
    pub event_distance: usize,
    pub mapq_score: u8,
}

impl MatchTrace {
    #[must_use]
    pub fn end_position(&self) -> usize {
        self.text_position + self.cigar.reference_span() as usize
    }

    /// Rebuilds the CIGAR and position a trace would have if its alignment
    /// had been computed by searching the *reverse-complemented* pattern
    /// against the *forward* index, instead of searching the as-given
    /// pattern against a mirrored reverse-complement block (spec.md §3:
    /// emulated-complement indexes require this translation before the
    /// trace can be reported in forward-reference coordinates).
    #[must_use]
    pub fn emulated_rc_search(mut cigar: Cigar, rc_text_position: usize, rc_window_len: usize) -> (Cigar, usize) {
        cigar.ops.reverse();
        let forward_position = rc_text_position + rc_window_len - cigar.reference_span() as usize - leading_soft_trim(&cigar);
        (cigar, forward_position)
    }
}

fn leading_soft_trim(cigar: &Cigar) -> usize {
    match cigar.ops.first() {
        Some(CigarOp::SoftTrim(len)) => *len as usize,
        _ => 0,
    }
}

/// The key a [`MatchesStore`] dedups positions by: which sequence, which
/// strand, and which endpoint.
type PositionKey = (String, Strand, usize);

/// Accumulates every [`MatchTrace`] a read's search produced, then dedups,
/// ranks and scores them (spec.md §4.J).
///
/// Dedup is backed by [`SeedableFoldHashMap`], the same `ihash_t`-style
/// 64-bit-key map the source uses for its position index (spec.md §9 design
/// note), rather than a linear scan over every prior trace.
#[derive(Clone, Debug, Default)]
pub struct MatchesStore {
    traces: Vec<MatchTrace>,
    by_start: SeedableFoldHashMap<PositionKey, ()>,
    by_end: SeedableFoldHashMap<PositionKey, ()>,
}

impl MatchesStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `trace`, silently dropping it if an existing trace already
    /// covers (almost) the same reference span: two traces are duplicates
    /// when they share a sequence/strand and either their start positions
    /// or their end positions coincide (spec.md §4.J "dedup by
    /// match_position / match_position + effective_length").
    pub fn add_match_trace(&mut self, trace: MatchTrace) {
        let start_key = (trace.sequence_name.clone(), trace.strand, trace.text_position);
        let end_key = (trace.sequence_name.clone(), trace.strand, trace.end_position());

        if self.by_start.get(&start_key).is_some() || self.by_end.get(&end_key).is_some() {
            return;
        }

        self.by_start.insert(start_key, ());
        self.by_end.insert(end_key, ());
        self.traces.push(trace);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    #[must_use]
    pub fn traces(&self) -> &[MatchTrace] {
        &self.traces
    }

    pub fn sort_by_score_desc(&mut self) {
        self.traces.sort_by(|a, b| b.swg_score.cmp(&a.swg_score));
    }

    pub fn sort_by_position(&mut self) {
        self.traces.sort_by(|a, b| (a.sequence_name.as_str(), a.text_position).cmp(&(b.sequence_name.as_str(), b.text_position)));
    }

    /// Drops every trace whose MAPQ is below `threshold`.
    pub fn filter_by_mapq(&mut self, threshold: u8) {
        self.traces.retain(|t| t.mapq_score >= threshold);
    }

    /// Assigns MAPQ to every trace from the score gap between it and the
    /// best trace, and returns the overall classification (spec.md §4.J:
    /// "computed from (number of matches, gap between best and second-best
    /// in swg / edit / event distance)").
    ///
    /// Grounded on the BWA-style "confidence from score gap" formula: the
    /// best trace gets high confidence only when it is clearly ahead of
    /// the second-best; with a single trace it gets the ceiling value. When
    /// the best `swg_score` is shared by more than one trace, the classifier
    /// keeps comparing `edit_distance`, then `event_distance`, then the
    /// CIGAR itself to find the finest level at which a tie still holds —
    /// see DESIGN.md for why this particular cascade was chosen over the
    /// several readings spec.md's prose admits.
    pub fn classify(&mut self) -> MatchClass {
        if self.traces.is_empty() {
            return MatchClass::Unmapped;
        }
        self.sort_by_score_desc();

        let best_score = self.traces[0].swg_score;
        let second_score = self.traces.get(1).map(|t| t.swg_score);
        let num_best = self.traces.iter().take_while(|t| t.swg_score == best_score).count();

        let mapq_for_best = match second_score {
            None => 60,
            Some(_) if num_best > 1 => 0,
            Some(second) => {
                let gap = (best_score - second).max(0);
                (gap.min(60)) as u8
            }
        };

        for (i, trace) in self.traces.iter_mut().enumerate() {
            trace.mapq_score = if i == 0 { mapq_for_best } else { 0 };
        }

        if self.traces.len() == 1 {
            return MatchClass::Unique;
        }
        if num_best == 1 {
            return MatchClass::Mmap;
        }

        let tied = &self.traces[..num_best];
        let best_edit = tied.iter().map(|t| t.edit_distance).min().unwrap();
        if tied.iter().any(|t| t.edit_distance != best_edit) {
            return MatchClass::TieSwgScore;
        }

        let best_event = tied.iter().map(|t| t.event_distance).min().unwrap();
        if tied.iter().any(|t| t.event_distance != best_event) {
            return MatchClass::TieEditDistance;
        }

        let first_cigar = &tied[0].cigar;
        if tied[1..].iter().any(|t| &t.cigar != first_cigar) {
            MatchClass::TieEventDistance
        } else {
            MatchClass::TieIndistinguishable
        }
    }

    #[must_use]
    pub fn best(&self) -> Option<&MatchTrace> {
        self.traces.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(name: &str, pos: usize, score: i64) -> MatchTrace {
        trace_with_cigar(name, pos, score, 0, 0, Cigar::new(vec![CigarOp::Match(10)]))
    }

    fn trace_with_cigar(name: &str, pos: usize, score: i64, edit_distance: usize, event_distance: usize, cigar: Cigar) -> MatchTrace {
        MatchTrace {
            strand: Strand::Forward,
            bs_strand: BsStrand::Unspecified,
            sequence_name: name.to_string(),
            text_position: pos,
            cigar,
            swg_score: score,
            edit_distance,
            event_distance,
            mapq_score: 0,
        }
    }

    #[test]
    fn duplicate_positions_are_dropped() {
        let mut store = MatchesStore::new();
        store.add_match_trace(trace("chr1", 100, 10));
        store.add_match_trace(trace("chr1", 100, 9));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn distinct_positions_are_kept() {
        let mut store = MatchesStore::new();
        store.add_match_trace(trace("chr1", 100, 10));
        store.add_match_trace(trace("chr1", 200, 10));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn single_trace_classifies_as_unique_with_max_mapq() {
        let mut store = MatchesStore::new();
        store.add_match_trace(trace("chr1", 100, 10));
        assert_eq!(store.classify(), MatchClass::Unique);
        assert_eq!(store.best().unwrap().mapq_score, 60);
    }

    #[test]
    fn empty_store_is_unmapped() {
        let mut store = MatchesStore::new();
        assert_eq!(store.classify(), MatchClass::Unmapped);
    }

    #[test]
    fn strictly_better_best_score_classifies_as_mmap() {
        // Best trace is clearly ahead by swg_score, but a second trace still
        // exists, so the read maps to more than one place overall.
        let mut store = MatchesStore::new();
        store.add_match_trace(trace("chr1", 100, 10));
        store.add_match_trace(trace("chr2", 200, 8));
        assert_eq!(store.classify(), MatchClass::Mmap);
    }

    #[test]
    fn tied_score_broken_by_edit_distance_is_tie_swg_score() {
        let mut store = MatchesStore::new();
        store.add_match_trace(trace_with_cigar("chr1", 100, 10, 1, 1, Cigar::new(vec![CigarOp::Match(9), CigarOp::Mismatch(1)])));
        store.add_match_trace(trace_with_cigar("chr2", 200, 10, 2, 2, Cigar::new(vec![CigarOp::Match(8), CigarOp::Mismatch(2)])));
        assert_eq!(store.classify(), MatchClass::TieSwgScore);
    }

    #[test]
    fn tied_score_and_edit_distance_broken_by_event_distance_is_tie_edit_distance() {
        let mut store = MatchesStore::new();
        store.add_match_trace(trace_with_cigar(
            "chr1",
            100,
            10,
            2,
            1,
            Cigar::new(vec![CigarOp::Match(8), CigarOp::Mismatch(2)]),
        ));
        store.add_match_trace(trace_with_cigar(
            "chr2",
            200,
            10,
            2,
            2,
            Cigar::new(vec![CigarOp::Match(8), CigarOp::Mismatch(1), CigarOp::Match(1), CigarOp::Mismatch(1)]),
        ));
        assert_eq!(store.classify(), MatchClass::TieEditDistance);
    }

    #[test]
    fn tied_numeric_measures_with_different_cigars_is_tie_event_distance() {
        let mut store = MatchesStore::new();
        store.add_match_trace(trace_with_cigar("chr1", 100, 10, 1, 1, Cigar::new(vec![CigarOp::Match(9), CigarOp::Mismatch(1)])));
        store.add_match_trace(trace_with_cigar("chr2", 200, 10, 1, 1, Cigar::new(vec![CigarOp::Mismatch(1), CigarOp::Match(9)])));
        assert_eq!(store.classify(), MatchClass::TieEventDistance);
    }

    #[test]
    fn fully_tied_traces_classify_as_tie_indistinguishable_with_zero_mapq() {
        // spec.md scenario S5: two occurrences of the same repeated motif,
        // same score/edit_distance/event_distance/CIGAR, only position differs.
        let mut store = MatchesStore::new();
        let cigar = Cigar::new(vec![CigarOp::Match(10)]);
        store.add_match_trace(trace_with_cigar("chr1", 100, 10, 0, 0, cigar.clone()));
        store.add_match_trace(trace_with_cigar("chr1", 500, 10, 0, 0, cigar));
        assert_eq!(store.classify(), MatchClass::TieIndistinguishable);
        assert_eq!(store.best().unwrap().mapq_score, 0);
    }

    #[test]
    fn filter_by_mapq_drops_low_confidence_traces() {
        let mut store = MatchesStore::new();
        store.add_match_trace(trace("chr1", 100, 10));
        store.add_match_trace(trace("chr2", 200, 2));
        store.classify();
        store.filter_by_mapq(30);
        assert_eq!(store.len(), 1);
    }
}
