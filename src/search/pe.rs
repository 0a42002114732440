//! Paired-end search control loop (spec.md §4.L).
//!
//! A thin layer over two independent [`crate::search::se::search_se`] runs:
//! search each end on its own budget, then classify every cross-end
//! combination that lands on the same sequence as concordant or discordant
//! per the configured orientation/layout/template-length window.
//!
//! The source's PE3 `recovery` stage re-searches an unmapped end inside a
//! text window anchored on its mapped mate, which needs the mapped end's
//! *absolute* concatenated-text offset; [`crate::matches::MatchTrace`] only
//! carries the sequence-local offset the SAM output wants. Recomputing the
//! absolute offset back from a sequence name isn't exposed by
//! [`crate::index::Index`], so recovery here instead re-searches the
//! unmapped end with one extra stratum of search error rather than a
//! windowed extension — a deliberate scope simplification, noted in
//! DESIGN.md, that trades the source's cheaper targeted rescan for a
//! slightly more expensive but index-API-compatible one.

use crate::config::{Config, Nominal, PairLayout, PairOrientation};
use crate::counters::SearchCounters;
use crate::index::{Index, Strand};
use crate::matches::MatchTrace;
use crate::search::se::search_se;

/// One candidate pairing of an end1 trace with an end2 trace.
#[derive(Clone, Debug)]
pub struct PairCandidate {
    pub mate1: MatchTrace,
    pub mate2: MatchTrace,
    pub template_length: i64,
    pub concordant: bool,
}

/// Outcome of one PE search.
#[derive(Debug)]
pub struct PeOutcome {
    pub mate1: Option<MatchTrace>,
    pub mate2: Option<MatchTrace>,
    pub best_pair: Option<PairCandidate>,
    /// The best discordant pair found, surfaced independently of
    /// `best_pair` when `pair_discordant_search` is `Always` (spec.md
    /// §6 `pair_discordant_search`, §4.L PE4 `find_pairs`): with `Always`
    /// a discordant pairing is reported even when a concordant one also
    /// exists, whereas `IfNoConcordant` only falls back to it.
    pub discordant_pair: Option<PairCandidate>,
    pub counters: SearchCounters,
}

/// Searches a read pair, pairing up end1/end2 matches into concordant
/// (preferred) or discordant pairs per `config.pair` (spec.md §4.L PE0-PE5).
pub fn search_pe(
    index: &Index, bases1: &[u8], qualities1: Option<&[u8]>, bases2: &[u8], qualities2: Option<&[u8]>, config: &Config, counters: &mut SearchCounters,
) -> PeOutcome {
    // PE1 `search_end1`.
    let outcome1 = search_se(index, bases1, qualities1, config, counters);
    // PE2 `search_end2`.
    let mut outcome2 = search_se(index, bases2, qualities2, config, counters);

    // PE3 `recovery`: one extra error stratum for whichever end came back
    // empty, provided the other end found something worth anchoring to.
    let outcome1 = if outcome1.matches.is_empty() && !outcome2.matches.is_empty() {
        recover(index, bases1, qualities1, config, counters)
    } else {
        outcome1
    };
    if outcome2.matches.is_empty() && !outcome1.matches.is_empty() {
        outcome2 = recover(index, bases2, qualities2, config, counters);
    }

    // PE4 `find_pairs`.
    let mut pairs: Vec<PairCandidate> = Vec::new();
    for m1 in outcome1.matches.traces() {
        for m2 in outcome2.matches.traces() {
            if m1.sequence_name != m2.sequence_name {
                continue;
            }
            let Some(candidate) = pair_candidate(m1, m2, config) else {
                continue;
            };
            pairs.push(candidate);
        }
    }

    let best_concordant = pairs.iter().filter(|p| p.concordant).max_by_key(|p| p.mate1.swg_score + p.mate2.swg_score).cloned();
    let best_discordant = pairs.iter().filter(|p| !p.concordant).max_by_key(|p| p.mate1.swg_score + p.mate2.swg_score).cloned();

    // `pair_discordant_search` controls whether a discordant pairing is
    // surfaced at all, and if so whether it competes with a concordant one
    // or is reported alongside it (spec.md §6): `Never` drops discordant
    // pairs entirely; `IfNoConcordant` only falls back to one when no
    // concordant pair was found; `Always` reports the best discordant pair
    // whenever one exists, even next to a found concordant pair.
    use crate::config::PairDiscordantSearch;
    let discordant_pair = match config.pair.discordant_search {
        PairDiscordantSearch::Never => None,
        PairDiscordantSearch::IfNoConcordant => {
            if best_concordant.is_none() {
                best_discordant.clone()
            } else {
                None
            }
        }
        PairDiscordantSearch::Always => best_discordant.clone(),
    };

    let best_pair = best_concordant.or_else(|| match config.pair.discordant_search {
        PairDiscordantSearch::Never => None,
        _ => best_discordant,
    });

    // PE5 `end`.
    let (mate1, mate2) = match &best_pair {
        Some(pair) => (Some(pair.mate1.clone()), Some(pair.mate2.clone())),
        None => (outcome1.matches.best().cloned(), outcome2.matches.best().cloned()),
    };

    PeOutcome {
        mate1,
        mate2,
        best_pair,
        discordant_pair,
        counters: *counters,
    }
}

fn recover(index: &Index, bases: &[u8], qualities: Option<&[u8]>, config: &Config, counters: &mut SearchCounters) -> crate::search::se::SeOutcome {
    let relaxed = Config {
        complete_search_error: bump_one_stratum(config.complete_search_error),
        alignment_max_error: bump_one_stratum(config.alignment_max_error),
        ..*config
    };
    search_se(index, bases, qualities, &relaxed, counters)
}

fn bump_one_stratum(nominal: Nominal) -> Nominal {
    match nominal {
        Nominal::Count(n) => Nominal::Count(n + 1),
        Nominal::Fraction(x) => Nominal::Fraction((x + 0.02).min(0.5)),
    }
}

fn pair_candidate(m1: &MatchTrace, m2: &MatchTrace, config: &Config) -> Option<PairCandidate> {
    let (left, right) = if m1.text_position <= m2.text_position { (m1, m2) } else { (m2, m1) };
    let template_length = (right.end_position() as i64 - left.text_position as i64).max(right.text_position as i64 - left.end_position() as i64);

    let within_template_length = template_length.unsigned_abs() as usize >= config.pair.min_template_length && template_length.unsigned_abs() as usize <= config.pair.max_template_length;

    let orientation_ok = match config.pair.orientation {
        PairOrientation::Fr => left.strand == Strand::Forward && right.strand == Strand::Reverse,
        PairOrientation::Rf => left.strand == Strand::Reverse && right.strand == Strand::Forward,
        PairOrientation::Ff => left.strand == Strand::Forward && right.strand == Strand::Forward,
        PairOrientation::Rr => left.strand == Strand::Reverse && right.strand == Strand::Reverse,
    };

    let layout_ok = match config.pair.layout {
        PairLayout::Separate => right.text_position >= left.end_position(),
        PairLayout::Overlap => right.text_position < left.end_position() && right.text_position >= left.text_position,
        PairLayout::Contain => right.end_position() <= left.end_position(),
    };

    let concordant = within_template_length && orientation_ok && layout_ok;

    Some(PairCandidate {
        mate1: m1.clone(),
        mate2: m2.clone(),
        template_length,
        concordant,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::builder::build_index;
    use crate::io::fastx::FastX;

    fn toy_index() -> Index {
        let records = vec![FastX {
            header:   "chr1".into(),
            sequence: b"ACGTACGTTTGGCCAATTGGCCAATTCCGGAACCGGTTAACCGGTTACGTACGT".to_vec(),
            quality:  None,
        }];
        build_index(&records, false)
    }

    #[test]
    fn both_ends_mapped_independently_are_reported_even_without_a_concordant_pair() {
        let index = toy_index();
        let config = Config {
            complete_search_error: Nominal::Count(0),
            alignment_max_error: Nominal::Count(0),
            max_bandwidth: Nominal::Count(0),
            pair: crate::config::PairConfig {
                paired_end_search: true,
                min_template_length: 0,
                max_template_length: 200,
                orientation: PairOrientation::Fr,
                layout: PairLayout::Separate,
                discordant_search: crate::config::PairDiscordantSearch::IfNoConcordant,
            },
            ..Config::default()
        };
        let mut counters = SearchCounters::new();
        let mate1 = b"ACGTACGTTTGGCC";
        let mate2 = b"AACCGGTTAACCGGTT";
        let outcome = search_pe(&index, mate1, None, mate2, None, &config, &mut counters);
        assert!(outcome.mate1.is_some());
        assert!(outcome.mate2.is_some());
    }

    #[test]
    fn discordant_search_always_reports_a_discordant_pair_alongside_a_concordant_one() {
        // end1's read matches twice: once close to end2's match (forms a
        // concordant pair) and once far away on the same sequence (forms a
        // discordant pair only, too far apart and in the wrong relative
        // orientation). With `Always`, both must be surfaced.
        let mate1 = b"ACGTGGCTTACGGTCA";
        let mate2 = b"TTGGCACGTAGGCATT";
        let mate2_rc = b"AATGCCTACGTGCCAA";

        let mut reference = Vec::new();
        reference.extend_from_slice(mate1); // occ1, concordant with mate2_rc below
        reference.extend_from_slice(b"TTTT");
        reference.extend_from_slice(mate2_rc);
        reference.extend_from_slice(&b"CAGT".repeat(50)); // filler, pushes occ2 out of range
        reference.extend_from_slice(mate1); // occ2, too far for a concordant pairing

        let records = vec![FastX {
            header:   "chr1".into(),
            sequence: reference,
            quality:  None,
        }];
        let index = build_index(&records, false);

        let config = Config {
            complete_search_error: Nominal::Count(0),
            alignment_max_error: Nominal::Count(0),
            max_bandwidth: Nominal::Count(0),
            pair: crate::config::PairConfig {
                paired_end_search: true,
                min_template_length: 0,
                max_template_length: 60,
                orientation: PairOrientation::Fr,
                layout: PairLayout::Separate,
                discordant_search: crate::config::PairDiscordantSearch::Always,
            },
            ..Config::default()
        };
        let mut counters = SearchCounters::new();
        let outcome = search_pe(&index, mate1, None, mate2, None, &config, &mut counters);

        let best = outcome.best_pair.expect("a concordant pair should be found");
        assert!(best.concordant);
        let discordant = outcome.discordant_pair.expect("Always must surface a discordant pair too");
        assert!(!discordant.concordant);
    }

    #[test]
    fn empty_reads_yield_no_pair() {
        let index = toy_index();
        let config = Config::default();
        let mut counters = SearchCounters::new();
        let outcome = search_pe(&index, b"", None, b"", None, &config, &mut counters);
        assert!(outcome.best_pair.is_none());
        assert!(outcome.mate1.is_none());
        assert!(outcome.mate2.is_none());
    }
}
