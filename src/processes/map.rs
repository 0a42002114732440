//! The `map` subcommand: loads a reference, streams reads, and writes SAM
//! (spec.md §1 "External interfaces", SPEC_FULL.md §0 crate shape).
//!
//! Grounded on `processes::standalone::aligner::arg_parsing`/`mod.rs` for
//! the clap-args-to-plain-struct shape and the open-streams/write-records
//! driving loop, generalized from one-shot pairwise alignment to an
//! indexed search over a whole reference.

use crate::align::SwgPenalties;
use crate::config::{Config, MappingMode, Nominal, PairConfig, PairDiscordantSearch, PairLayout, PairOrientation};
use crate::counters::SearchCounters;
use crate::index::Index;
use crate::index::builder::build_index;
use crate::io::{self, FastX, MapFailedOpenExt, MateInfo, SamRecordWriter, SamWriter};
use crate::search::{search_pe, search_se};
use clap::Args;
use std::path::PathBuf;
use std::sync::Mutex;
use zoe::data::fasta::FastaSeq;

#[cfg(not(feature = "dev_no_rayon"))]
use crate::io::SamWriterThreaded;
#[cfg(not(feature = "dev_no_rayon"))]
use rayon::iter::{ParallelBridge, ParallelIterator};

#[derive(Args, Debug)]
pub struct MapArgs {
    /// FASTA reference to index and search against.
    #[arg(long)]
    pub reference: PathBuf,

    /// First (or only, for SE) read file.
    #[arg(long)]
    pub reads1: PathBuf,

    /// Second read file, for paired-end search.
    #[arg(long)]
    pub reads2: Option<PathBuf>,

    /// SAM output path; stdout when omitted.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "fast")]
    pub mapping_mode: CliMappingMode,

    /// Maximum fraction of the read length allowed as search/alignment error.
    #[arg(long, default_value_t = 0.08)]
    pub max_error_rate: f64,

    /// Maximum reported matches per read.
    #[arg(long, default_value_t = 5)]
    pub max_reported_matches: usize,

    /// Minimum MAPQ a match must have to be reported.
    #[arg(long, default_value_t = 0)]
    pub mapq_threshold: u8,

    /// Minimum/maximum template length for a concordant pair.
    #[arg(long, default_value_t = 0)]
    pub min_template_length: usize,
    #[arg(long, default_value_t = 1000)]
    pub max_template_length: usize,

    /// Collapse homopolymer runs into an RL view before seeding; helps
    /// reads from platforms whose error profile is dominated by run-length
    /// miscalls rather than substitutions.
    #[arg(long, default_value_t = false)]
    pub run_length_mode: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum CliMappingMode {
    Fast,
    Thorough,
    Complete,
}

impl From<CliMappingMode> for MappingMode {
    fn from(value: CliMappingMode) -> Self {
        match value {
            CliMappingMode::Fast => MappingMode::Fast,
            CliMappingMode::Thorough => MappingMode::Thorough,
            CliMappingMode::Complete => MappingMode::Complete,
        }
    }
}

/// Builds the core [`Config`] a `map` invocation will search with.
#[must_use]
pub fn config_from_args(args: &MapArgs) -> Config {
    Config {
        mapping_mode: args.mapping_mode.into(),
        max_reported_matches: args.max_reported_matches,
        complete_search_error: Nominal::Fraction(args.max_error_rate),
        alignment_max_error: Nominal::Fraction(args.max_error_rate),
        mapq_threshold: args.mapq_threshold,
        run_length_mode: args.run_length_mode,
        pair: PairConfig {
            paired_end_search: false,
            min_template_length: args.min_template_length,
            max_template_length: args.max_template_length,
            orientation: PairOrientation::Fr,
            layout: PairLayout::Separate,
            discordant_search: PairDiscordantSearch::IfNoConcordant,
        },
        swg_penalties: SwgPenalties {
            matching:   1,
            mismatch:   4,
            gap_open:   6,
            gap_extend: 1,
        },
        ..Config::default()
    }
}

/// Runs the `map` subcommand end to end: index the reference, stream reads,
/// search each one, and write SAM output.
pub fn run(args: &MapArgs) -> std::io::Result<()> {
    let mut config = config_from_args(args);
    if let Err(err) = config.validate() {
        return Err(std::io::Error::other(format!("invalid map configuration: {err}")));
    }

    let reference_records = read_fasta_reference(&args.reference)?;
    let index = build_index(&reference_records, true);
    let references: Vec<FastaSeq> = reference_records
        .into_iter()
        .map(|r| FastaSeq {
            name:     r.header,
            sequence: r.sequence,
        })
        .collect();

    let (reader1, reader2, io_threads) = io::open_read_streams(&args.reads1, args.reads2.as_ref()).map_failed_open(&args.reads1, args.reads2.as_ref())?;

    config.pair.paired_end_search = reader2.is_some();

    let mut stream = io::create_write_stream(args.output.as_ref())?;
    io::write_header(&mut stream, &references)?;

    let counters = Mutex::new(SearchCounters::new());

    #[cfg(not(feature = "dev_no_rayon"))]
    {
        let writer = SamWriterThreaded::from_writer(stream);
        match reader2 {
            None => run_se(reader1, &index, &config, writer.clone(), &counters)?,
            Some(reader2) => run_pe(reader1, reader2, &index, &config, writer.clone(), &counters)?,
        }
        writer.flush()?;
    }

    #[cfg(feature = "dev_no_rayon")]
    {
        let mut writer = SamWriter::new(stream);
        match reader2 {
            None => run_se(reader1, &index, &config, &mut writer, &counters)?,
            Some(reader2) => run_pe(reader1, reader2, &index, &config, &mut writer, &counters)?,
        }
        writer.flush()?;
    }

    io_threads.finalize()?;

    let counters = counters.into_inner().unwrap();
    eprintln!(
        "mapped {} reads, {} unmapped ({} regions, {} candidates, {} discarded)",
        counters.reads_mapped, counters.reads_unmapped, counters.regions_generated, counters.candidates_generated, counters.candidates_discarded
    );

    Ok(())
}

/// Searches every read in `reader`, one worker thread per disjoint batch
/// (spec.md §5: "multiple OS threads, each running one instance of the
/// entire core pipeline"), writing each SAM record as soon as its search
/// completes. Falls back to a plain serial loop under `dev_no_rayon`.
#[cfg(not(feature = "dev_no_rayon"))]
fn run_se<R: std::io::Read + Send>(reader: crate::io::FastXReader<R>, index: &Index, config: &Config, writer: SamWriterThreaded, counters: &Mutex<SearchCounters>) -> std::io::Result<()> {
    reader.par_bridge().try_for_each_with(writer, |writer, record| -> std::io::Result<()> {
        let record = record?;
        let qualities = quality_bytes(&record);
        let mut local_counters = SearchCounters::new();
        let outcome = search_se(index, &record.sequence, qualities, config, &mut local_counters);
        counters.lock().unwrap().merge(&local_counters);
        let best = outcome.matches.best();
        writer.write_record(&record.header, &record.sequence, qualities, best, None, None)
    })
}

#[cfg(feature = "dev_no_rayon")]
fn run_se<R: std::io::Read>(reader: crate::io::FastXReader<R>, index: &Index, config: &Config, writer: &mut SamWriter<impl std::io::Write>, counters: &Mutex<SearchCounters>) -> std::io::Result<()> {
    for record in reader {
        let record = record?;
        let qualities = quality_bytes(&record);
        let mut local_counters = SearchCounters::new();
        let outcome = search_se(index, &record.sequence, qualities, config, &mut local_counters);
        counters.lock().unwrap().merge(&local_counters);
        let best = outcome.matches.best();
        writer.write_record(&record.header, &record.sequence, qualities, best, None, None)?;
    }
    Ok(())
}

#[cfg(not(feature = "dev_no_rayon"))]
fn run_pe<R: std::io::Read + Send>(
    reader1: crate::io::FastXReader<R>, reader2: crate::io::FastXReader<R>, index: &Index, config: &Config, writer: SamWriterThreaded, counters: &Mutex<SearchCounters>,
) -> std::io::Result<()> {
    reader1.zip(reader2).par_bridge().try_for_each_with(writer, |writer, pair| -> std::io::Result<()> {
        let (record1, record2) = (pair.0?, pair.1?);
        let qualities1 = quality_bytes(&record1);
        let qualities2 = quality_bytes(&record2);

        let mut local_counters = SearchCounters::new();
        let outcome = search_pe(index, &record1.sequence, qualities1, &record2.sequence, qualities2, config, &mut local_counters);
        counters.lock().unwrap().merge(&local_counters);

        let (record1_mate_info, record2_mate_info) = mate_infos(&outcome);
        writer.write_record(&record1.header, &record1.sequence, qualities1, outcome.mate1.as_ref(), Some(true), Some(record1_mate_info))?;
        writer.write_record(&record2.header, &record2.sequence, qualities2, outcome.mate2.as_ref(), Some(false), Some(record2_mate_info))
    })
}

#[cfg(feature = "dev_no_rayon")]
fn run_pe<R: std::io::Read>(
    reader1: crate::io::FastXReader<R>, reader2: crate::io::FastXReader<R>, index: &Index, config: &Config, writer: &mut SamWriter<impl std::io::Write>, counters: &Mutex<SearchCounters>,
) -> std::io::Result<()> {
    for pair in reader1.zip(reader2) {
        let (record1, record2) = (pair.0?, pair.1?);
        let qualities1 = quality_bytes(&record1);
        let qualities2 = quality_bytes(&record2);

        let mut local_counters = SearchCounters::new();
        let outcome = search_pe(index, &record1.sequence, qualities1, &record2.sequence, qualities2, config, &mut local_counters);
        counters.lock().unwrap().merge(&local_counters);

        let (record1_mate_info, record2_mate_info) = mate_infos(&outcome);
        writer.write_record(&record1.header, &record1.sequence, qualities1, outcome.mate1.as_ref(), Some(true), Some(record1_mate_info))?;
        writer.write_record(&record2.header, &record2.sequence, qualities2, outcome.mate2.as_ref(), Some(false), Some(record2_mate_info))?;
    }
    Ok(())
}

/// Builds the `mate` annotation each record needs about *its pair partner*:
/// `record1`'s mate annotation describes `mate2`, and vice versa.
fn mate_infos<'a>(outcome: &'a crate::search::PeOutcome) -> (MateInfo<'a>, MateInfo<'a>) {
    let concordant = outcome.best_pair.as_ref().is_some_and(|p| p.concordant);
    let template_length = outcome.best_pair.as_ref().map(|p| p.template_length);

    let mate_info_for = |trace: Option<&'a crate::matches::MatchTrace>, sign: i64| match trace {
        Some(m) => MateInfo {
            mapped: true,
            reverse: m.strand == crate::index::Strand::Reverse,
            concordant,
            template_length: template_length.map(|t| t * sign),
            sequence_name: Some(m.sequence_name.as_str()),
        },
        None => MateInfo {
            mapped: false,
            reverse: false,
            concordant: false,
            template_length: None,
            sequence_name: None,
        },
    };

    // `record1`'s "mate" param describes mate2, and `record2`'s describes
    // mate1; TLEN is reported with a sign relative to each record.
    (mate_info_for(outcome.mate2.as_ref(), 1), mate_info_for(outcome.mate1.as_ref(), -1))
}

fn quality_bytes(record: &FastX) -> Option<&[u8]> {
    record.quality.as_ref().map(std::convert::AsRef::as_ref)
}

fn read_fasta_reference(path: &std::path::Path) -> std::io::Result<Vec<FastX>> {
    let (reader, thread) = io::open_read_stream(path)?;
    let mut records = Vec::new();
    for record in reader {
        records.push(record?);
    }
    if let Some(thread) = thread {
        thread.join().unwrap()?;
    }
    Ok(records)
}
