//! Single-end and paired-end search control loops (spec.md §4.K, §4.L).

pub mod pe;
pub mod se;

pub use pe::{PairCandidate, PeOutcome, search_pe};
pub use se::{SeOutcome, search_se};
