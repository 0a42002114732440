//! Pattern construction (spec.md §3 "Pattern", §4.B "Pattern builder").
//!
//! Turns one read's raw bases and optional qualities into the object every
//! later stage queries: an encoded key, a quality classification, a
//! per-read error/bandwidth budget, and precompiled BPM/k-mer helpers.

pub mod bpm_pattern;
pub mod kmer_filter;
pub mod quality;

use crate::error::PatternError;
use crate::index::dna_text::Base;
use bpm_pattern::BpmPattern;
use kmer_filter::KmerFilter;
use quality::{QualityClass, QualityFormat, QualityModel, classify_qualities};

/// Implementation limit on a pattern's key length (spec.md §7
/// `PatternError::KeyTooLong`): past this, the per-base scratch the later
/// stages allocate (BPM blocks, scaffold seeds, SWG bands) stops being a
/// "short read" workload and the read is rejected outright rather than
/// silently consuming an unbounded amount of memory.
pub const MAX_KEY_LEN: usize = 10_000;

/// Run-length encoded view of the key, built when run-length mode is on.
#[derive(Clone, Debug)]
pub struct RunLengthView {
    pub rl_key:  Vec<u8>,
    pub rl_runs: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct Pattern {
    key: Vec<u8>,
    quality_mask: Option<Vec<QualityClass>>,
    pub num_wildcards: usize,
    pub num_low_quality_bases: usize,
    pub max_effective_filtering_error: usize,
    pub max_effective_bandwidth: usize,
    run_length: Option<RunLengthView>,
    pub bpm_pattern: Option<BpmPattern>,
    pub kmer_filter: Option<KmerFilter>,
}

/// Resolved (already `ceil(x * L)`-instantiated, per spec.md §6) build
/// parameters for one read.
#[derive(Clone, Copy, Debug)]
pub struct PatternBuildParams {
    pub quality_model: QualityModel,
    pub quality_format: QualityFormat,
    pub quality_threshold: u8,
    pub nominal_error: usize,
    pub nominal_bandwidth: usize,
    pub run_length_mode: bool,
}

impl Pattern {
    /// Builds a pattern from raw ASCII bases and optional ASCII qualities.
    ///
    /// Returns a [`PatternError`] (a "null pattern", spec.md §4.B) when the
    /// key is empty, consists only of wildcards, or exceeds the
    /// implementation's length limit; the caller (the SE control loop) must
    /// treat that as an immediate "unmapped" outcome (spec.md §7).
    pub fn build(bases: &[u8], qualities: Option<&[u8]>, params: &PatternBuildParams) -> Result<Self, PatternError> {
        if bases.is_empty() {
            return Err(PatternError::EmptyKey);
        }
        if bases.len() > MAX_KEY_LEN {
            return Err(PatternError::KeyTooLong {
                len:   bases.len(),
                limit: MAX_KEY_LEN,
            });
        }

        let key: Vec<u8> = bases.iter().map(|&b| Base::from_ascii(b) as u8).collect();
        let num_wildcards = key.iter().filter(|&&c| !Base::from_code(c).is_canonical()).count();
        if num_wildcards == key.len() {
            return Err(PatternError::AllWildcard);
        }

        let quality_mask = if matches!(params.quality_format, QualityFormat::Ignore) {
            None
        } else if let Some(q) = qualities.filter(|q| !q.is_empty()) {
            let phred: Vec<u8> = q.iter().map(|&b| params.quality_format.decode(b)).collect();
            Some(classify_qualities(&phred, params.quality_model, params.quality_threshold))
        } else {
            None
        };

        let num_low_quality_bases = quality_mask.as_ref().map_or(0, |mask| mask.iter().filter(|c| **c != QualityClass::Real).count());

        let max_effective_filtering_error = params.nominal_error + num_low_quality_bases;
        let max_effective_bandwidth = params.nominal_bandwidth + num_low_quality_bases;

        let run_length = params.run_length_mode.then(|| build_run_length_view(&key));

        let search_key: &[u8] = run_length.as_ref().map_or(&key, |rl| &rl.rl_key);
        let (bpm_pattern, kmer_filter) = if max_effective_filtering_error > 0 && !search_key.is_empty() {
            let err_rate = max_effective_filtering_error as f64 / search_key.len() as f64;
            (Some(bpm_pattern::compile(search_key, err_rate)), Some(kmer_filter::build(search_key)))
        } else {
            (None, None)
        };

        Ok(Self {
            key,
            quality_mask,
            num_wildcards,
            num_low_quality_bases,
            max_effective_filtering_error,
            max_effective_bandwidth,
            run_length,
            bpm_pattern,
            kmer_filter,
        })
    }

    /// The full decoded key (one code per original base), used for final
    /// CIGAR unrolling and reporting.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The key every index/search stage actually queries: the run-length
    /// key when RL mode is enabled, otherwise the plain key (spec.md §4.B:
    /// "all downstream stages see only the rl_key").
    #[inline]
    #[must_use]
    pub fn search_key(&self) -> &[u8] {
        self.run_length.as_ref().map_or(&self.key, |rl| &rl.rl_key)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.key.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn quality_mask(&self) -> Option<&[QualityClass]> {
        self.quality_mask.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn run_length(&self) -> Option<&RunLengthView> {
        self.run_length.as_ref()
    }

    /// Only exact lookup is permitted once the error budget collapses to
    /// zero (spec.md §4.B).
    #[inline]
    #[must_use]
    pub fn exact_only(&self) -> bool {
        self.max_effective_filtering_error == 0
    }
}

fn build_run_length_view(key: &[u8]) -> RunLengthView {
    let mut rl_key = Vec::new();
    let mut rl_runs = Vec::new();
    let mut i = 0;
    while i < key.len() {
        let mut run = 1u32;
        while i + (run as usize) < key.len() && key[i + run as usize] == key[i] {
            run += 1;
        }
        rl_key.push(key[i]);
        rl_runs.push(run);
        i += run as usize;
    }
    RunLengthView { rl_key, rl_runs }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_params() -> PatternBuildParams {
        PatternBuildParams {
            quality_model: QualityModel::Flat,
            quality_format: QualityFormat::Ignore,
            quality_threshold: 20,
            nominal_error: 2,
            nominal_bandwidth: 2,
            run_length_mode: false,
        }
    }

    #[test]
    fn empty_bases_yield_null_pattern() {
        assert!(matches!(Pattern::build(b"", None, &default_params()), Err(PatternError::EmptyKey)));
    }

    #[test]
    fn all_wildcard_bases_yield_null_pattern() {
        assert!(matches!(Pattern::build(b"NNNN", None, &default_params()), Err(PatternError::AllWildcard)));
    }

    #[test]
    fn oversized_key_is_rejected() {
        let bases = vec![b'A'; MAX_KEY_LEN + 1];
        assert!(matches!(Pattern::build(&bases, None, &default_params()), Err(PatternError::KeyTooLong { .. })));
    }

    #[test]
    fn low_quality_bases_inflate_error_and_bandwidth_budget() {
        let params = PatternBuildParams {
            quality_model: QualityModel::Gem,
            quality_format: QualityFormat::Offset33,
            ..default_params()
        };
        let bases = b"ACGTACGT";
        let quals = [b'I', b'I', b'I', b'!', b'I', b'I', b'I', b'I']; // one base far below threshold
        let pattern = Pattern::build(bases, Some(&quals), &params).unwrap();
        assert!(pattern.num_low_quality_bases >= 1);
        assert_eq!(pattern.max_effective_filtering_error, 2 + pattern.num_low_quality_bases);
    }

    #[test]
    fn zero_error_budget_skips_bpm_and_kmer_compilation() {
        let params = PatternBuildParams {
            nominal_error: 0,
            nominal_bandwidth: 0,
            ..default_params()
        };
        let pattern = Pattern::build(b"ACGTACGT", None, &params).unwrap();
        assert!(pattern.exact_only());
        assert!(pattern.bpm_pattern.is_none());
        assert!(pattern.kmer_filter.is_none());
    }

    #[test]
    fn run_length_mode_collapses_homopolymer_runs() {
        let params = PatternBuildParams {
            run_length_mode: true,
            ..default_params()
        };
        let pattern = Pattern::build(b"AAACCGTTTT", None, &params).unwrap();
        let rl = pattern.run_length().unwrap();
        assert_eq!(rl.rl_runs, vec![3, 2, 1, 4]);
        assert_eq!(pattern.search_key().len(), 4);
        assert_eq!(pattern.key().len(), 10);
    }
}
