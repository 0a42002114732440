//! The flat core configuration object (spec.md §6 "Configuration surface").
//!
//! One struct per option family, composed into a single `Config`, mirroring
//! how `processes::standalone::aligner::arg_parsing` turns `clap::Args`
//! into the plain structs the rest of the pipeline consumes.

use crate::align::SwgPenalties;
use crate::pattern::quality::{QualityFormat, QualityModel};
use crate::region_profile::RegionProfileModel;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum MappingMode {
    Fast,
    Thorough,
    Complete,
    BruteForce,
    FixedFiltering,
    Test,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum UnboundedAlignment {
    Never,
    IfUnmapped,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum PairOrientation {
    Fr,
    Rf,
    Ff,
    Rr,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum PairLayout {
    Separate,
    Overlap,
    Contain,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum PairDiscordantSearch {
    Always,
    IfNoConcordant,
    Never,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum BisulfiteRead {
    Inferred,
    One,
    Two,
    Interleaved,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum MapqModel {
    None,
    Gem,
    Classify,
}

/// A nominal threshold, either a fixed count or a fraction of the read
/// length to be instantiated as `ceil(x * L)` per read (spec.md §6).
#[derive(Clone, Copy, Debug)]
pub enum Nominal {
    Count(usize),
    Fraction(f64),
}

impl Nominal {
    #[must_use]
    pub fn instantiate(self, read_length: usize) -> usize {
        match self {
            Nominal::Count(n) => n,
            Nominal::Fraction(x) => (x * read_length as f64).ceil() as usize,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ScaffoldConfig {
    pub enabled: bool,
    pub min_coverage: usize,
    pub min_matching_length: usize,
    pub homopolymer_min_context: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct CigarCurationConfig {
    pub enabled: bool,
    pub min_end_context: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct PairConfig {
    pub paired_end_search: bool,
    pub min_template_length: usize,
    pub max_template_length: usize,
    pub orientation: PairOrientation,
    pub layout: PairLayout,
    pub discordant_search: PairDiscordantSearch,
}

#[derive(Clone, Copy, Debug)]
pub struct RegionProfileModels {
    pub minimal: RegionProfileModel,
    pub boost: RegionProfileModel,
    pub delimit: RegionProfileModel,
}

impl Default for RegionProfileModels {
    fn default() -> Self {
        Self {
            minimal: RegionProfileModel::minimal(),
            boost:   RegionProfileModel::boost(),
            delimit: RegionProfileModel::delimit(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub mapping_mode: MappingMode,
    pub search_max_matches: usize,
    pub min_reported_matches: usize,
    pub max_reported_matches: usize,
    pub complete_search_error: Nominal,
    pub complete_strata_after_best: usize,
    pub alignment_max_error: Nominal,
    pub max_bandwidth: Nominal,
    pub alignment_min_identity: f64,
    pub unbounded_alignment: UnboundedAlignment,
    pub scaffold: ScaffoldConfig,
    pub cigar_curation: CigarCurationConfig,
    pub swg_penalties: SwgPenalties,
    pub swg_threshold_nominal: i64,
    pub quality_model: QualityModel,
    pub quality_format: QualityFormat,
    pub quality_threshold: u8,
    /// Whether `Pattern::build` collapses homopolymer runs into an RL view
    /// before seeding (spec.md §3 "Optional RL-encoded view").
    pub run_length_mode: bool,
    /// Per-read arena capacity, expressed as bytes per base of the read
    /// (spec.md §5 "Arena discipline"). Scratch usage (candidate positions
    /// generated per stage) is reserved against `bases.len() *
    /// arena_bytes_per_base` bytes; exceeding it fails the read with
    /// `CapacityError` rather than growing unboundedly.
    pub arena_bytes_per_base: usize,
    pub pair: PairConfig,
    pub bisulfite_read: BisulfiteRead,
    pub region_profile_models: RegionProfileModels,
    pub filtering_threshold: usize,
    pub filtering_region_factor: f64,
    pub mapq_model: MapqModel,
    pub mapq_threshold: u8,
}

impl Config {
    /// Validates the configuration surface against spec.md §7's
    /// `ConfigurationError` taxonomy. Called once at startup; never on the
    /// read path.
    pub fn validate(&self) -> Result<(), crate::error::ConfigurationError> {
        use crate::error::ConfigurationError;

        if self.min_reported_matches > self.max_reported_matches {
            return Err(ConfigurationError::MinExceedsMax {
                min_reported_matches: self.min_reported_matches,
                max_reported_matches: self.max_reported_matches,
            });
        }
        if self.quality_threshold == 0 {
            return Err(ConfigurationError::ZeroQualityThreshold);
        }
        if let Nominal::Fraction(x) = self.alignment_max_error {
            if !(0.0..1.0).contains(&x) {
                return Err(ConfigurationError::ErrorFractionOutOfRange {
                    name:  "alignment_max_error",
                    value: x,
                });
            }
        }
        if let Nominal::Fraction(x) = self.complete_search_error {
            if !(0.0..1.0).contains(&x) {
                return Err(ConfigurationError::ErrorFractionOutOfRange {
                    name:  "complete_search_error",
                    value: x,
                });
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mapping_mode: MappingMode::Fast,
            search_max_matches: 10,
            min_reported_matches: 1,
            max_reported_matches: 5,
            complete_search_error: Nominal::Fraction(0.04),
            complete_strata_after_best: 1,
            alignment_max_error: Nominal::Fraction(0.08),
            max_bandwidth: Nominal::Fraction(0.12),
            alignment_min_identity: 0.8,
            unbounded_alignment: UnboundedAlignment::IfUnmapped,
            scaffold: ScaffoldConfig {
                enabled: true,
                min_coverage: 16,
                min_matching_length: 4,
                homopolymer_min_context: 3,
            },
            cigar_curation: CigarCurationConfig {
                enabled: true,
                min_end_context: 2,
            },
            swg_penalties: SwgPenalties {
                matching:   1,
                mismatch:   4,
                gap_open:   6,
                gap_extend: 1,
            },
            swg_threshold_nominal: 0,
            quality_model: QualityModel::Gem,
            quality_format: QualityFormat::Offset33,
            quality_threshold: 20,
            run_length_mode: false,
            arena_bytes_per_base: 4096,
            pair: PairConfig {
                paired_end_search: false,
                min_template_length: 0,
                max_template_length: 1000,
                orientation: PairOrientation::Fr,
                layout: PairLayout::Separate,
                discordant_search: PairDiscordantSearch::IfNoConcordant,
            },
            bisulfite_read: BisulfiteRead::Inferred,
            region_profile_models: RegionProfileModels::default(),
            filtering_threshold: 50,
            filtering_region_factor: 0.5,
            mapq_model: MapqModel::Gem,
            mapq_threshold: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn min_exceeding_max_reported_matches_is_rejected() {
        let config = Config {
            min_reported_matches: 5,
            max_reported_matches: 2,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nominal_fraction_instantiates_with_ceiling() {
        assert_eq!(Nominal::Fraction(0.08).instantiate(50), 4);
        assert_eq!(Nominal::Count(3).instantiate(50), 3);
    }
}
