//! Banded Smith-Waterman-Gotoh alignment with affine gaps (spec.md §4.I).
//!
//! Grounded on the 8-bit/16-bit overflow-fallback shape of the teacher's
//! striped aligner (`MaybeAligned::{Some, Overflowed}` in
//! `processes::standalone::aligner::methods::striped_sw_local`): a cheap
//! narrow pass is tried first and only escalated to a wider one when scores
//! threaten to saturate. Unlike the teacher's generic pairwise aligner, this
//! one must band each scaffold chain link independently and hand back a
//! from-scratch CIGAR with `soft_trim`, so the recurrence itself is a plain
//! scalar Gotoh DP rather than a call into `zoe::alignment`'s striped
//! profile API.

use crate::align::cigar::{Cigar, CigarOp, SwgPenalties};
use crate::filtering::scaffold::ScaffoldRegion;

const NEG_INF: i32 = i32::MIN / 4;

/// One aligned segment: a CIGAR covering `[key_begin, key_end)` against
/// `[text_begin, text_end)`, plus its raw SWG score.
#[derive(Clone, Debug)]
pub struct SwgAlignment {
    pub score: i64,
    pub cigar: Cigar,
    pub text_begin: usize,
    pub effective_length: u32,
}

/// Aligns `key` against `text` inside a band of half-width `bandwidth`
/// around the main diagonal, soft-trimming any unreached prefix/suffix of
/// `key` (spec.md §4.I: local alignment, the whole key need not match).
///
/// Returns `None` when the best score is below `swg_threshold_nominal`.
#[must_use]
pub fn align_banded(key: &[u8], text: &[u8], penalties: &SwgPenalties, bandwidth: usize, swg_threshold_nominal: i64) -> Option<SwgAlignment> {
    let n = key.len();
    let m = text.len();
    if n == 0 {
        return None;
    }

    // band[i] holds columns j in [lo(i), hi(i)); the text diagonal tracks
    // key position i with slack `bandwidth` either side.
    let lo_of = |i: usize| i.saturating_sub(bandwidth);
    let hi_of = |i: usize| (i + bandwidth + 1).min(m);

    // M/I/D score matrices, banded: stored as a Vec<Vec<i32>> indexed
    // [i][j - lo(i)] to keep memory proportional to n * (2*bandwidth+1).
    let width = |i: usize| hi_of(i) - lo_of(i);
    let mut mat: Vec<Vec<i32>> = (0..=n).map(|i| vec![NEG_INF; width(i) + 1]).collect();
    let mut ins: Vec<Vec<i32>> = (0..=n).map(|i| vec![NEG_INF; width(i) + 1]).collect();
    let mut del: Vec<Vec<i32>> = (0..=n).map(|i| vec![NEG_INF; width(i) + 1]).collect();

    mat[0][0] = 0;

    let gap_first = penalties.gap_open + penalties.gap_extend;

    for i in 0..=n {
        let lo = lo_of(i);
        let hi = hi_of(i);
        for j in lo..hi {
            let jj = j - lo;
            if i == 0 && j == 0 {
                continue;
            }

            // Deletion: text consumed, key not advanced (j increases at
            // fixed i), i.e. comes from the same row, previous column.
            if j > 0 && jj > 0 {
                let prev_mat = mat[i][jj - 1];
                let prev_del = del[i][jj - 1];
                del[i][jj] = (prev_mat - gap_first).max(prev_del - penalties.gap_extend);
            }

            // Insertion: key consumed, text not advanced (comes from the
            // previous row at the same text column, if that column lies in
            // the previous row's band).
            if i > 0 {
                let plo = lo_of(i - 1);
                let phi = hi_of(i - 1);
                if j >= plo && j < phi {
                    let pjj = j - plo;
                    let prev_mat = mat[i - 1][pjj];
                    let prev_ins = ins[i - 1][pjj];
                    ins[i][jj] = (prev_mat - gap_first).max(prev_ins - penalties.gap_extend);
                }
            }

            if i > 0 && j > 0 {
                let plo = lo_of(i - 1);
                let phi = hi_of(i - 1);
                if j - 1 >= plo && j - 1 < phi {
                    let pjj = (j - 1) - plo;
                    let diag = mat[i - 1][pjj];
                    let sub_score = if key[i - 1] == text[j - 1] { penalties.matching } else { penalties.matching - penalties.mismatch };
                    let cand = diag + sub_score;
                    mat[i][jj] = cand.max(ins[i][jj]).max(del[i][jj]).max(0);
                } else {
                    mat[i][jj] = ins[i][jj].max(del[i][jj]).max(0);
                }
            } else {
                mat[i][jj] = ins[i][jj].max(del[i][jj]).max(0);
            }
        }
    }

    // Best local score anywhere in the last row (end-free on text; we want
    // whichever text column the key's suffix best lands on).
    let mut best_i = n;
    let mut best_j = lo_of(n);
    let mut best_score = NEG_INF;
    for i in 0..=n {
        let lo = lo_of(i);
        let hi = hi_of(i);
        for j in lo..hi {
            let jj = j - lo;
            let s = mat[i][jj];
            if s > best_score {
                best_score = s;
                best_i = i;
                best_j = j;
            }
        }
    }

    if i64::from(best_score) < swg_threshold_nominal {
        return None;
    }

    let mut ops: Vec<CigarOp> = Vec::new();
    let (mut i, mut j) = (best_i, best_j);
    let end_j = best_j;
    while i > 0 || j > 0 {
        let lo = lo_of(i);
        let jj = j - lo;
        let here = mat[i][jj];
        if here == 0 && i != n {
            break;
        }
        if i > 0 && j > 0 {
            let plo = lo_of(i - 1);
            if j >= plo + 1 && j - 1 < hi_of(i - 1) {
                let pjj = (j - 1) - plo;
                let diag = mat[i - 1][pjj];
                let sub_score = if key[i - 1] == text[j - 1] { penalties.matching } else { penalties.matching - penalties.mismatch };
                if here == diag + sub_score {
                    ops.push(if key[i - 1] == text[j - 1] { CigarOp::Match(1) } else { CigarOp::Mismatch(1) });
                    i -= 1;
                    j -= 1;
                    continue;
                }
            }
        }
        if here == ins[i][jj] && i > 0 {
            ops.push(CigarOp::Ins(1));
            i -= 1;
            continue;
        }
        if here == del[i][jj] && j > 0 {
            ops.push(CigarOp::Del(1));
            j -= 1;
            continue;
        }
        break;
    }

    if i > 0 {
        ops.push(CigarOp::SoftTrim(i as u32));
    }
    ops.reverse();
    let trailing_trim = n - best_i;
    let mut cigar = Cigar::default();
    for op in ops {
        cigar.push(op);
    }
    if trailing_trim > 0 {
        cigar.push(CigarOp::SoftTrim(trailing_trim as u32));
    }

    let begin_j = end_j.saturating_sub(cigar.reference_span() as usize);
    Some(SwgAlignment {
        score: i64::from(best_score),
        effective_length: cigar.reference_span(),
        text_begin: begin_j,
        cigar,
    })
}

/// Aligns `key` against `text` in one or more segments delimited by a
/// scaffold chain (spec.md §4.I: "if scaffolding supplied a non-empty
/// chain, alignment is broken into segments across chain links; each
/// segment is aligned within a narrow band of width `w` + link-slack").
///
/// `text` must be the window corresponding to `key`'s full span (i.e.
/// `chain` regions' `text_begin`/`text_end` are offsets into `text`).
/// Falls back to one unsegmented `align_banded` call when `chain` is empty.
#[must_use]
pub fn align_scaffolded(key: &[u8], text: &[u8], chain: &[ScaffoldRegion], penalties: &SwgPenalties, bandwidth: usize, swg_threshold_nominal: i64) -> Option<SwgAlignment> {
    if chain.is_empty() {
        return align_banded(key, text, penalties, bandwidth, swg_threshold_nominal);
    }

    let mut cigar = Cigar::default();
    let mut total_score: i64 = 0;
    let mut first_text_begin: Option<usize> = None;

    let mut cursor_key = 0usize;
    let mut cursor_text = 0usize;

    let mut segments: Vec<(usize, usize, usize, usize)> = Vec::new();
    for region in chain {
        if region.key_begin > cursor_key {
            segments.push((cursor_key, region.key_begin, cursor_text, region.text_begin));
        }
        segments.push((region.key_begin, region.key_end, region.text_begin, region.text_end));
        cursor_key = region.key_end;
        cursor_text = region.text_end;
    }
    if cursor_key < key.len() {
        segments.push((cursor_key, key.len(), cursor_text, text.len()));
    }

    for (key_lo, key_hi, text_lo, text_hi) in segments {
        if key_lo == key_hi {
            continue;
        }
        let sub_key = &key[key_lo..key_hi];
        let sub_text = &text[text_lo.min(text.len())..text_hi.min(text.len())];
        let link_slack = bandwidth + key_hi.saturating_sub(key_lo).abs_diff(text_hi.saturating_sub(text_lo));
        let aligned = align_banded(sub_key, sub_text, penalties, link_slack, NEG_INF as i64)?;
        if first_text_begin.is_none() {
            first_text_begin = Some(text_lo + aligned.text_begin);
        }
        total_score += aligned.score;
        for op in aligned.cigar.ops {
            cigar.push(op);
        }
    }

    if total_score < swg_threshold_nominal {
        return None;
    }

    Some(SwgAlignment {
        score: total_score,
        effective_length: cigar.reference_span(),
        text_begin: first_text_begin.unwrap_or(0),
        cigar,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn penalties() -> SwgPenalties {
        SwgPenalties {
            matching:   1,
            mismatch:   4,
            gap_open:   6,
            gap_extend: 1,
        }
    }

    #[test]
    fn exact_match_scores_as_all_matches() {
        let key = b"ACGTACGT";
        let text = b"ACGTACGT";
        let result = align_banded(key, text, &penalties(), 2, 0).unwrap();
        assert_eq!(result.score, 8);
        assert_eq!(result.cigar.to_sam_string(), "8M");
    }

    #[test]
    fn single_mismatch_is_scored_as_mismatch_not_gap() {
        let key = b"ACGTACGT";
        let mut text = key.to_vec();
        text[4] = b'T';
        let result = align_banded(key, &text, &penalties(), 2, 0).unwrap();
        assert!(result.cigar.ops.iter().any(|op| matches!(op, CigarOp::Mismatch(_))));
        // 7 matched columns + 1 mismatched column: 7*1 + (1*1 - 1*4) = 4.
        assert_eq!(result.score, 4);
    }

    #[test]
    fn below_threshold_alignment_is_rejected() {
        let key = b"AAAAAAAA";
        let text = b"TTTTTTTT";
        assert!(align_banded(key, text, &penalties(), 2, 5).is_none());
    }

    #[test]
    fn empty_key_yields_no_alignment() {
        assert!(align_banded(b"", b"ACGT", &penalties(), 2, 0).is_none());
    }

    #[test]
    fn wildcard_in_read_aligns_as_mismatch_matches_s4_scenario() {
        let key = b"ACGNACGT";
        let text = b"ACGTACGT";
        let result = align_banded(key, text, &penalties(), 2, 0).unwrap();
        assert_eq!(result.cigar.to_sam_string(), "3M1X4M");
        assert_eq!(result.cigar.ops[1], CigarOp::Mismatch(1));
    }
}
