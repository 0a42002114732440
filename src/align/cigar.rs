//! CIGAR operations and the affine-gap penalty set they are scored against
//! (spec.md §3 "Match trace", §4.I, §8 property 6 "CIGAR ↔ score
//! consistency").

use std::fmt;

/// One CIGAR operation, with an explicit run length (spec.md §4.I output:
/// "sequence of {match(len), mismatch(c), ins(len), del(len),
/// soft_trim(len)}"). Consecutive mismatches are one `Mismatch(len)` run
/// rather than `len` separate length-1 ops; per-base identity of a
/// mismatched base is not retained here; it is read directly off the
/// pattern/text slices when needed (e.g. reverse-strand complementing).
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum CigarOp {
    Match(u32),
    Mismatch(u32),
    Ins(u32),
    Del(u32),
    SoftTrim(u32),
}

impl CigarOp {
    #[inline]
    #[must_use]
    pub fn len(self) -> u32 {
        match self {
            CigarOp::Match(l) | CigarOp::Mismatch(l) | CigarOp::Ins(l) | CigarOp::Del(l) | CigarOp::SoftTrim(l) => l,
        }
    }

    #[inline]
    #[must_use]
    pub fn sam_code(self) -> char {
        match self {
            CigarOp::Match(_) => 'M',
            CigarOp::Mismatch(_) => 'X',
            CigarOp::Ins(_) => 'I',
            CigarOp::Del(_) => 'D',
            CigarOp::SoftTrim(_) => 'S',
        }
    }

    /// Whether this op advances a position along the reference/text.
    #[inline]
    #[must_use]
    pub fn consumes_reference(self) -> bool {
        matches!(self, CigarOp::Match(_) | CigarOp::Mismatch(_) | CigarOp::Del(_))
    }

    /// Whether this op advances a position along the query/read.
    #[inline]
    #[must_use]
    pub fn consumes_query(self) -> bool {
        matches!(self, CigarOp::Match(_) | CigarOp::Mismatch(_) | CigarOp::Ins(_) | CigarOp::SoftTrim(_))
    }
}

/// Affine-gap scoring parameters (spec.md §6 "swg penalties").
#[derive(Clone, Copy, Debug)]
pub struct SwgPenalties {
    pub matching: i32,
    pub mismatch: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Cigar {
    pub ops: Vec<CigarOp>,
}

impl Cigar {
    #[must_use]
    pub fn new(ops: Vec<CigarOp>) -> Self {
        Self { ops }
    }

    /// Pushes `op` onto the tail, merging into the previous op if it is the
    /// same kind (keeps the CIGAR canonical, as SAM requires).
    pub fn push(&mut self, op: CigarOp) {
        if op.len() == 0 {
            return;
        }
        if let Some(last) = self.ops.last_mut() {
            let merged = match (*last, op) {
                (CigarOp::Match(a), CigarOp::Match(b)) => Some(CigarOp::Match(a + b)),
                (CigarOp::Mismatch(a), CigarOp::Mismatch(b)) => Some(CigarOp::Mismatch(a + b)),
                (CigarOp::Ins(a), CigarOp::Ins(b)) => Some(CigarOp::Ins(a + b)),
                (CigarOp::Del(a), CigarOp::Del(b)) => Some(CigarOp::Del(a + b)),
                (CigarOp::SoftTrim(a), CigarOp::SoftTrim(b)) => Some(CigarOp::SoftTrim(a + b)),
                _ => None,
            };
            if let Some(merged) = merged {
                *last = merged;
                return;
            }
        }
        self.ops.push(op);
    }

    /// The SAM-format CIGAR string, e.g. `"5M1X2M"`.
    #[must_use]
    pub fn to_sam_string(&self) -> String {
        if self.ops.is_empty() {
            return "*".to_string();
        }
        let mut out = String::new();
        for op in &self.ops {
            use std::fmt::Write;
            write!(out, "{}{}", op.len(), op.sam_code()).expect("writing to a String never fails");
        }
        out
    }

    /// Total reference/text span this CIGAR covers (spec.md §3
    /// `match_alignment.effective_length`).
    #[must_use]
    pub fn reference_span(&self) -> u32 {
        self.ops.iter().filter(|op| op.consumes_reference()).map(|op| op.len()).sum()
    }

    /// Number of discrete edit events (mismatch/insertion/deletion runs),
    /// counting each run once regardless of its length — as opposed to
    /// `edit_distance`, which counts per-base (spec.md §3 "distance
    /// (event)" vs "edit_distance").
    #[must_use]
    pub fn event_distance(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, CigarOp::Mismatch(_) | CigarOp::Ins(_) | CigarOp::Del(_))).count()
    }

    /// Soft-clips a terminal mismatch/insertion whose adjacent match run is
    /// shorter than `min_end_context`, on both ends of the CIGAR: a terminal
    /// edit anchored by only a handful of matching bases is more likely
    /// noise at the read's edge than a real variant (spec.md §6
    /// `cigar_curation`, `min_end_context`).
    #[must_use]
    pub fn curate_ends(&self, min_end_context: usize) -> Cigar {
        if min_end_context == 0 || self.ops.len() < 2 {
            return self.clone();
        }
        let mut ops = self.ops.clone();

        if let [CigarOp::Match(len), edit, ..] = ops[..] {
            if (len as usize) < min_end_context && matches!(edit, CigarOp::Mismatch(_) | CigarOp::Ins(_)) {
                ops.remove(1);
                ops.remove(0);
                ops.insert(0, CigarOp::SoftTrim(len + edit.len()));
            }
        }

        if let [.., edit, CigarOp::Match(len)] = ops[..] {
            if (len as usize) < min_end_context && matches!(edit, CigarOp::Mismatch(_) | CigarOp::Ins(_)) {
                ops.pop();
                ops.pop();
                ops.push(CigarOp::SoftTrim(len + edit.len()));
            }
        }

        let mut curated = Cigar::default();
        for op in ops {
            curated.push(op);
        }
        curated
    }

    /// Recomputes the alignment score this CIGAR implies against
    /// `penalties`, independent of however it was produced (spec.md §8
    /// property 6).
    #[must_use]
    pub fn recompute_score(&self, penalties: &SwgPenalties) -> i64 {
        let mut score = 0i64;
        for op in &self.ops {
            score += match op {
                CigarOp::Match(len) => i64::from(penalties.matching) * i64::from(*len),
                CigarOp::Mismatch(len) => (i64::from(penalties.matching) - i64::from(penalties.mismatch)) * i64::from(*len),
                CigarOp::Ins(len) | CigarOp::Del(len) => -(i64::from(penalties.gap_open) + i64::from(penalties.gap_extend) * i64::from(*len)),
                CigarOp::SoftTrim(_) => 0,
            };
        }
        score
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sam_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_merges_consecutive_same_kind_ops() {
        let mut cigar = Cigar::default();
        cigar.push(CigarOp::Match(3));
        cigar.push(CigarOp::Match(2));
        cigar.push(CigarOp::Mismatch(1));
        assert_eq!(cigar.ops, vec![CigarOp::Match(5), CigarOp::Mismatch(1)]);
    }

    #[test]
    fn to_sam_string_matches_s2_scenario() {
        let cigar = Cigar::new(vec![CigarOp::Match(5), CigarOp::Mismatch(1), CigarOp::Match(2)]);
        assert_eq!(cigar.to_sam_string(), "5M1X2M");
    }

    #[test]
    fn recompute_score_matches_s3_scenario() {
        let cigar = Cigar::new(vec![CigarOp::Match(6), CigarOp::Ins(1), CigarOp::Match(3)]);
        let penalties = SwgPenalties {
            matching:   1,
            mismatch:   4,
            gap_open:   6,
            gap_extend: 1,
        };
        assert_eq!(cigar.recompute_score(&penalties), 2);
    }

    #[test]
    fn recompute_score_matches_s2_scenario() {
        let cigar = Cigar::new(vec![CigarOp::Match(5), CigarOp::Mismatch(1), CigarOp::Match(2)]);
        let penalties = SwgPenalties {
            matching:   1,
            mismatch:   4,
            gap_open:   6,
            gap_extend: 1,
        };
        assert_eq!(cigar.recompute_score(&penalties), 4);
    }

    #[test]
    fn reference_span_excludes_insertions() {
        let cigar = Cigar::new(vec![CigarOp::Match(6), CigarOp::Ins(1), CigarOp::Match(3)]);
        assert_eq!(cigar.reference_span(), 9);
    }

    #[test]
    fn event_distance_counts_runs_not_bases() {
        let cigar = Cigar::new(vec![CigarOp::Match(3), CigarOp::Mismatch(2), CigarOp::Match(4), CigarOp::Ins(1), CigarOp::Match(2)]);
        assert_eq!(cigar.event_distance(), 2);
    }

    #[test]
    fn curate_ends_clips_a_terminal_mismatch_with_thin_context() {
        let cigar = Cigar::new(vec![CigarOp::Match(1), CigarOp::Mismatch(1), CigarOp::Match(8)]);
        let curated = cigar.curate_ends(3);
        assert_eq!(curated.ops, vec![CigarOp::SoftTrim(2), CigarOp::Match(8)]);
    }

    #[test]
    fn curate_ends_leaves_well_supported_terminal_mismatches_alone() {
        let cigar = Cigar::new(vec![CigarOp::Match(5), CigarOp::Mismatch(1), CigarOp::Match(8)]);
        let curated = cigar.curate_ends(3);
        assert_eq!(curated, cigar);
    }
}
