//! Alignment: from-scratch affine-gap Smith-Waterman-Gotoh and the CIGAR it
//! produces (spec.md §4.I).

pub mod cigar;
pub mod swg;

pub use cigar::{Cigar, CigarOp, SwgPenalties};
pub use swg::{SwgAlignment, align_banded, align_scaffolded};
