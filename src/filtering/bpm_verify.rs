//! Tiled bit-parallel Myers edit-distance verification (spec.md §4.G).
//!
//! Each tile runs the classic Hyyrö/Myers 64-bit bit-vector recurrence
//! independently against the whole candidate text window, with quick
//! abandon once the running distance cannot recover within the tile's
//! budget even if every remaining character matched. Tile distances are
//! summed and joined by a bound on the gap between successive tiles'
//! match columns.

use crate::pattern::bpm_pattern::{BpmPattern, TileDescriptor};

#[derive(Clone, Copy, Debug)]
pub struct TileResult {
    pub distance: usize,
    pub match_column: usize,
}

/// Runs one tile's Myers recurrence against `text` (encoded bases).
///
/// Returns `None` if quick abandon fires: the running distance plus the
/// best possible outcome for the remaining text already exceeds
/// `tile.error_budget`.
fn run_tile(tile: &TileDescriptor, text: &[u8]) -> Option<TileResult> {
    let m = tile.length;
    debug_assert!(m > 0 && m <= 64);
    let mask_top_bit = 1u64 << (m - 1);
    let full_mask = if m == 64 { u64::MAX } else { (1u64 << m) - 1 };

    let mut pv: u64 = full_mask;
    let mut mv: u64 = 0;
    let mut score = m;
    let mut best_score = score;
    let mut best_column = 0usize;

    for (j, &t) in text.iter().enumerate() {
        let eq = if (t as usize) < 4 { tile.eq[t as usize] } else { 0 };
        let xv = eq | mv;
        let xh = (((eq & pv).wrapping_add(pv)) ^ pv) | eq;
        let mut ph = mv | !(xh | pv);
        let mut mh = pv & xh;

        if ph & mask_top_bit != 0 {
            score += 1;
        } else if mh & mask_top_bit != 0 {
            score -= 1;
        }

        ph = (ph << 1) | 1;
        ph &= full_mask;
        mh <<= 1;
        mh &= full_mask;
        pv = (mh | !(xv | ph)) & full_mask;
        mv = ph & xv;

        if score < best_score {
            best_score = score;
            best_column = j + 1;
        }

        let remaining = text.len() - (j + 1);
        if best_score > tile.error_budget + remaining {
            return None;
        }
    }

    Some(TileResult {
        distance: best_score,
        match_column: best_column,
    })
}

#[derive(Clone, Debug)]
pub struct VerifyResult {
    /// Upper bound on edit distance: sum of tile distances plus inter-tile
    /// link cost.
    pub align_distance: usize,
    /// Lower bound: sum of tile distances alone (no link cost).
    pub align_distance_min_bound: usize,
    pub match_end_column: usize,
}

/// Verifies `text` (a candidate window, encoded bases) against
/// `pattern`'s tiles. Returns `None` if any tile is abandoned (its true
/// distance cannot be bounded below its budget) — the candidate is
/// `verified_discarded` (spec.md §4.F.5).
#[must_use]
pub fn verify(pattern: &BpmPattern, text: &[u8], max_effective_error: usize) -> Option<VerifyResult> {
    let mut total_distance = 0usize;
    let mut min_bound = 0usize;
    let mut last_column: Option<(usize, usize)> = None; // (tile.offset, match_column)
    let mut link_cost = 0usize;
    let mut match_end_column = 0usize;

    for tile in &pattern.tiles {
        let result = run_tile(tile, text)?;
        if result.distance > tile.error_budget {
            return None;
        }
        total_distance += result.distance;
        min_bound += result.distance;
        match_end_column = result.match_column;

        if let Some((prev_offset, prev_column)) = last_column {
            let expected_gap = tile.offset - prev_offset;
            let actual_gap = result.match_column.saturating_sub(prev_column);
            link_cost += expected_gap.abs_diff(actual_gap);
        }
        last_column = Some((tile.offset, result.match_column));
    }

    let align_distance = total_distance + link_cost;
    if align_distance > max_effective_error {
        return None;
    }

    Some(VerifyResult {
        align_distance,
        align_distance_min_bound: min_bound,
        match_end_column,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::dna_text::Base;
    use crate::pattern::bpm_pattern::compile;

    fn encode(s: &[u8]) -> Vec<u8> {
        s.iter().map(|&b| Base::from_ascii(b) as u8).collect()
    }

    #[test]
    fn exact_match_has_zero_distance() {
        let key = encode(b"ACGTACGTACGT");
        let pattern = compile(&key, 0.2);
        let result = verify(&pattern, &key, 3).unwrap();
        assert_eq!(result.align_distance, 0);
        assert_eq!(result.align_distance_min_bound, 0);
    }

    #[test]
    fn one_substitution_is_within_budget() {
        let key = encode(b"ACGTACGTACGT");
        let mut text = key.clone();
        text[3] = Base::T as u8; // ACGT -> ACTT
        let pattern = compile(&key, 0.2);
        let result = verify(&pattern, &text, 2).unwrap();
        assert!(result.align_distance >= 1);
        assert!(result.align_distance <= 2);
    }

    #[test]
    fn lower_bound_never_exceeds_upper_bound() {
        let key = encode(b"ACGTACGTACGTACGTACGT");
        let mut text = key.clone();
        text[5] = Base::A as u8;
        text[12] = Base::C as u8;
        let pattern = compile(&key, 0.3);
        let result = verify(&pattern, &text, 6).unwrap();
        assert!(result.align_distance_min_bound <= result.align_distance);
    }

    #[test]
    fn wildly_different_text_is_discarded() {
        let key = encode(b"ACGTACGTACGT");
        let text = encode(b"TTTTTTTTTTTT");
        let pattern = compile(&key, 0.1);
        assert!(verify(&pattern, &text, 1).is_none());
    }
}
