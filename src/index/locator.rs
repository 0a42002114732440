//! Maps a global text position back to `(sequence_tag, local_offset, strand,
//! bs_strand)` (spec.md §3 "Locator").

use std::fmt;

/// Which strand of the reference a match sits on.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

/// Bisulfite-conversion bookkeeping carried per spec.md §6's
/// `bisulfite_read` option; the core does not perform base-conversion
/// search, it only threads this tag through to the reported match (spec.md
/// SPEC_FULL.md §2).
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Default)]
pub enum BsStrand {
    #[default]
    Unspecified,
    One,
    Two,
}

/// One indexed reference sequence's span within the concatenated text.
#[derive(Clone, Debug)]
pub struct SequenceSpan {
    pub name: String,
    /// Offset of the first base of this sequence in the forward text.
    pub start: usize,
    pub length: usize,
}

/// Resolves a global text position to a human-readable location.
///
/// Sequences are concatenated with a [`Base::Sep`](crate::index::dna_text::Base::Sep)
/// separator between them; if the index also stores the reverse complement
/// (`indexed_complement = true`), a mirrored block of spans follows a
/// `Base::Jump` boundary and [`Locator::locate`] reports `Strand::Reverse`
/// for positions inside it, translated back into forward-text coordinates.
#[derive(Clone, Debug)]
pub struct Locator {
    forward_spans: Vec<SequenceSpan>,
    /// Total length of the forward block (sum of spans + separators), i.e.
    /// the offset where a mirrored reverse-complement block would start.
    forward_block_len: usize,
    indexed_complement: bool,
}

#[derive(Debug)]
pub struct LocatorError(pub usize);

impl fmt::Display for LocatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "text position {} falls outside every indexed sequence", self.0)
    }
}
impl std::error::Error for LocatorError {}

impl Locator {
    #[must_use]
    pub fn new(forward_spans: Vec<SequenceSpan>, forward_block_len: usize, indexed_complement: bool) -> Self {
        Self {
            forward_spans,
            forward_block_len,
            indexed_complement,
        }
    }

    #[must_use]
    pub fn num_sequences(&self) -> usize {
        self.forward_spans.len()
    }

    /// Resolves `text_position` (global, 0-based, into the encoded text
    /// buffer) to `(sequence_name, local_offset, strand, bs_strand)`.
    ///
    /// For `indexed_complement = true` indexes, a position inside the mirror
    /// block is translated back to the forward sequence it corresponds to
    /// and reported with `Strand::Reverse`; per spec.md §3 "returning
    /// strand=Reverse flips position interpretation" the caller must treat
    /// the CIGAR/alignment produced for that match as needing reversal, see
    /// [`crate::matches::MatchesStore::add_match_trace`].
    pub fn locate(&self, text_position: usize) -> Result<(&str, usize, Strand, BsStrand), LocatorError> {
        let (position, strand) = if self.indexed_complement && text_position >= self.forward_block_len {
            let mirrored = text_position - self.forward_block_len;
            // The mirror block stores the reverse complement of the forward
            // block with sequence order preserved but each sequence reversed
            // in place, so a mirrored offset `m` inside one sequence maps to
            // `length - 1 - m` in forward coordinates.
            (mirrored, Strand::Reverse)
        } else {
            (text_position, Strand::Forward)
        };

        for span in &self.forward_spans {
            if position >= span.start && position < span.start + span.length {
                let local_offset = match strand {
                    Strand::Forward => position - span.start,
                    Strand::Reverse => span.length - 1 - (position - span.start),
                };
                return Ok((&span.name, local_offset, strand, BsStrand::Unspecified));
            }
        }

        Err(LocatorError(text_position))
    }

    /// Decomposes into raw parts for [`crate::index::persist`] serialization.
    #[must_use]
    pub fn into_raw_parts(self) -> (Vec<SequenceSpan>, usize, bool) {
        (self.forward_spans, self.forward_block_len, self.indexed_complement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans() -> Vec<SequenceSpan> {
        vec![
            SequenceSpan {
                name:   "chr1".into(),
                start:  0,
                length: 10,
            },
            SequenceSpan {
                name:   "chr2".into(),
                start:  11,
                length: 5,
            },
        ]
    }

    #[test]
    fn forward_only_locate() {
        let locator = Locator::new(spans(), 16, false);
        let (name, offset, strand, _) = locator.locate(3).unwrap();
        assert_eq!(name, "chr1");
        assert_eq!(offset, 3);
        assert_eq!(strand, Strand::Forward);

        let (name, offset, ..) = locator.locate(12).unwrap();
        assert_eq!(name, "chr2");
        assert_eq!(offset, 1);
    }

    #[test]
    fn position_in_separator_is_an_error() {
        let locator = Locator::new(spans(), 16, false);
        assert!(locator.locate(10).is_err());
    }

    #[test]
    fn mirror_block_reports_reverse_strand() {
        let locator = Locator::new(spans(), 16, true);
        let (name, offset, strand, _) = locator.locate(16).unwrap();
        assert_eq!(name, "chr1");
        assert_eq!(offset, 9);
        assert_eq!(strand, Strand::Reverse);
    }
}
