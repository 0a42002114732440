//! The core's error taxonomy (spec.md §7).
//!
//! Grounded on the teacher's hand-rolled error style
//! (`io::OpenFastqError`): small enums with manual `Display`/`Error`
//! impls, no `thiserror`/`anyhow`. `ConfigurationError` and `IndexError`
//! abort startup; `PatternError` and `CapacityError` are per-read and
//! recoverable (never propagated past the SE/PE control loop, which turns
//! them into an "unmapped" outcome).

use std::fmt;

#[derive(Clone, Debug)]
pub enum ConfigurationError {
    MinExceedsMax { min_reported_matches: usize, max_reported_matches: usize },
    ZeroQualityThreshold,
    ErrorFractionOutOfRange { name: &'static str, value: f64 },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::MinExceedsMax { min_reported_matches, max_reported_matches } => {
                write!(f, "min_reported_matches ({min_reported_matches}) exceeds max_reported_matches ({max_reported_matches})")
            }
            ConfigurationError::ZeroQualityThreshold => write!(f, "quality_threshold must be nonzero"),
            ConfigurationError::ErrorFractionOutOfRange { name, value } => {
                write!(f, "{name} must lie in [0, 1) when given as a fraction, got {value}")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

#[derive(Clone, Debug)]
pub enum IndexError {
    VersionMismatch { found: u32, expected: u32 },
    Truncated,
    Inconsistent(String),
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::VersionMismatch { found, expected } => write!(f, "index format version {found} does not match expected {expected}"),
            IndexError::Truncated => write!(f, "index bundle is truncated"),
            IndexError::Inconsistent(detail) => write!(f, "index bundle is inconsistent: {detail}"),
        }
    }
}

impl std::error::Error for IndexError {}

impl From<crate::index::persist::PersistError> for IndexError {
    fn from(err: crate::index::persist::PersistError) -> Self {
        use crate::index::persist::PersistError;
        match err {
            PersistError::VersionMismatch { found, expected } => IndexError::VersionMismatch { found, expected },
            PersistError::Truncated | PersistError::Io(_) => IndexError::Truncated,
            PersistError::BadMagic | PersistError::UnknownBlockKind(_) => IndexError::Inconsistent(err.to_string()),
        }
    }
}

/// Per-read, recoverable: the read is reported unmapped (spec.md §7).
#[derive(Clone, Copy, Debug)]
pub enum PatternError {
    EmptyKey,
    AllWildcard,
    KeyTooLong { len: usize, limit: usize },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::EmptyKey => write!(f, "pattern key is empty"),
            PatternError::AllWildcard => write!(f, "pattern key consists entirely of wildcard bases"),
            PatternError::KeyTooLong { len, limit } => write!(f, "pattern key length {len} exceeds implementation limit {limit}"),
        }
    }
}

impl std::error::Error for PatternError {}

/// Per-read, recoverable: the arena is reset and the read is reported
/// unmapped with a diagnostic annotation (spec.md §7).
#[derive(Clone, Copy, Debug)]
pub struct CapacityError {
    pub requested: usize,
    pub available: usize,
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arena exhausted: requested {} bytes, {} available", self.requested, self.available)
    }
}

impl std::error::Error for CapacityError {}

/// Why one read was reported unmapped despite not being a hard failure.
#[derive(Clone, Copy, Debug)]
pub enum UnmappedReason {
    Pattern(PatternError),
    Capacity(CapacityError),
    NoCandidatesSurvived,
}

impl fmt::Display for UnmappedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmappedReason::Pattern(e) => write!(f, "{e}"),
            UnmappedReason::Capacity(e) => write!(f, "{e}"),
            UnmappedReason::NoCandidatesSurvived => write!(f, "no candidate survived filtering/alignment"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_messages_name_the_offending_option() {
        let err = ConfigurationError::ErrorFractionOutOfRange {
            name:  "alignment_max_error",
            value: 1.2,
        };
        assert!(err.to_string().contains("alignment_max_error"));
    }
}
