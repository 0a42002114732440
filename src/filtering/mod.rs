//! Candidate generation and filtering: turns region-profile hits into
//! verified, scaffolded candidate regions ready for SWG alignment (spec.md
//! §4.F, §4.G, §4.H).

pub mod bpm_verify;
pub mod candidates;
pub mod scaffold;

pub use candidates::{CandidateGenerator, CandidatePosition, CandidateRegion};
