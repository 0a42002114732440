//! File and stream plumbing for `map`: auto-detecting FASTA/FASTQ input
//! (optionally gzip-compressed, optionally paired), and SAM output.
//!
//! This mirrors the teacher's `open_fastq_file`/`create_writer` pattern: a
//! small [`define_whichever`]-style enum per direction, with gzip handled by
//! spawning a decoder/encoder thread connected through an anonymous pipe so
//! the rest of the pipeline never has to know whether a file was compressed.

mod fastx;
mod sam_writer;

pub use fastx::{FastX, FastXReader};
pub use sam_writer::{MateInfo, SamRecordWriter, SamWriter, SamWriterThreaded, write_header};

use flate2::{Compression, read::MultiGzDecoder, write::GzEncoder};
use std::{
    error::Error,
    fmt,
    fs::File,
    io::{BufWriter, PipeReader, Read, Stdout, stdout},
    path::{Path, PathBuf},
    thread::{self, JoinHandle},
};
use zoe::{data::err::GetCode, define_whichever};

define_whichever! {
    #[allow(clippy::large_enum_variant)]
    #[doc = "The different ways `map`'s read input can be backed."]
    pub(crate) enum ReadFileZip {
        #[doc = "A reader for a regular uncompressed file"]
        File(File),
        #[doc = "A reader for a gzip-compressed file, decoded on a background thread"]
        Zipped(PipeReader),
    }

    impl Read for ReadFileZip {}
}

define_whichever! {
    #[doc = "The different ways `map`'s SAM output can be backed."]
    pub(crate) enum WriteFileZipStdout {
        #[doc = "A writer for a regular uncompressed file"]
        File(BufWriter<File>),
        #[doc = "A writer for a gzip-compressed file"]
        Zipped(GzEncoder<BufWriter<File>>),
        #[doc = "A writer for uncompressed data to stdout"]
        Stdout(BufWriter<Stdout>),
    }

    impl std::io::Write for WriteFileZipStdout {}
}

/// Opens a single FASTA/FASTQ file, auto-detecting gzip compression from the
/// `.gz` extension and format (FASTA vs FASTQ) from the first record marker.
///
/// ## Errors
///
/// `path` must exist and contain FASTA or FASTQ data; if zipped, pipe
/// creation must succeed.
pub fn open_read_stream<P: AsRef<Path>>(path: P) -> std::io::Result<(FastXReader<ReadFileZip>, Option<IoThread>)> {
    let file = File::open(&path)?;
    let is_gz = path.as_ref().extension().is_some_and(|ext| ext == "gz");

    if is_gz {
        let (pipe, thread) = spawn_decoder(&path)?;
        Ok((FastXReader::from_readable(ReadFileZip::Zipped(pipe))?, Some(thread)))
    } else {
        Ok((FastXReader::from_readable(ReadFileZip::File(file))?, None))
    }
}

/// Opens one or two correlated read streams (SE: one, PE: two), as produced
/// by [`open_read_stream`].
///
/// ## Errors
///
/// Both paths must exist and contain FASTA/FASTQ data.
pub fn open_read_streams<P: AsRef<Path>>(
    path1: P, path2: Option<P>,
) -> Result<(FastXReader<ReadFileZip>, Option<FastXReader<ReadFileZip>>, IoThreads), OpenReadError> {
    let (reader1, thread1) = open_read_stream(&path1).map_err(OpenReadError::First)?;

    let Some(path2) = path2 else {
        return Ok((reader1, None, IoThreads(thread1, None)));
    };

    let (reader2, thread2) = open_read_stream(&path2).map_err(OpenReadError::Second)?;
    Ok((reader1, Some(reader2), IoThreads(thread1, thread2)))
}

/// Creates a SAM output stream, using `path` to decide between a regular
/// file, a gzip file, or stdout (when `path` is `None`).
///
/// ## Errors
///
/// Creating `path` must succeed, if specified.
pub fn create_write_stream<P: AsRef<Path>>(path: Option<P>) -> std::io::Result<WriteFileZipStdout> {
    let writer = match path {
        Some(ref p) => {
            let is_gz = p.as_ref().extension().is_some_and(|ext| ext == "gz");
            let buf_writer = BufWriter::new(File::create(p)?);

            if is_gz {
                WriteFileZipStdout::Zipped(GzEncoder::new(buf_writer, Compression::default()))
            } else {
                WriteFileZipStdout::File(buf_writer)
            }
        }
        None => WriteFileZipStdout::Stdout(BufWriter::new(stdout())),
    };

    Ok(writer)
}

/// Spawns a thread decoding a gzip file into a pipe the rest of the pipeline
/// reads from directly.
fn spawn_decoder(path: impl AsRef<Path>) -> std::io::Result<(PipeReader, IoThread)> {
    let (reader, mut writer) = std::io::pipe()?;
    let mut decoder = MultiGzDecoder::new(File::open(path)?);

    let thread = thread::spawn(move || -> std::io::Result<()> {
        std::io::copy(&mut decoder, &mut writer)?;
        Ok(())
    });

    Ok((reader, thread))
}

/// Handle to a background decoding thread.
pub type IoThread = JoinHandle<std::io::Result<()>>;

/// Holds the (up to two) background decoding threads for a SE/PE read pair.
pub struct IoThreads(Option<IoThread>, Option<IoThread>);

impl IoThreads {
    /// Joins the underlying threads, propagating the first error encountered.
    pub fn finalize(self) -> std::io::Result<()> {
        if let Some(thread1) = self.0 {
            thread1.join().unwrap()?;
        }
        if let Some(thread2) = self.1 {
            thread2.join().unwrap()?;
        }
        Ok(())
    }
}

/// Indicates which of a read pair's two input files failed to open.
#[derive(Debug)]
pub enum OpenReadError {
    First(std::io::Error),
    Second(std::io::Error),
}

impl fmt::Display for OpenReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenReadError::First(e) | OpenReadError::Second(e) => write!(f, "{e}"),
        }
    }
}

impl Error for OpenReadError {}
impl GetCode for OpenReadError {}

/// Adds the file path(s) as context to a failed [`open_read_streams`] call.
pub trait MapFailedOpenExt<T> {
    fn map_failed_open(self, path1: &Path, path2: Option<&PathBuf>) -> std::io::Result<T>;
}

impl<T> MapFailedOpenExt<T> for Result<T, OpenReadError> {
    fn map_failed_open(self, path1: &Path, path2: Option<&PathBuf>) -> std::io::Result<T> {
        self.map_err(|e| match e {
            OpenReadError::First(error) => {
                std::io::Error::other(format!("Failed to read the data in file {path1:#?} due to the error:\n{error}"))
            }
            OpenReadError::Second(error) => std::io::Error::other(format!(
                "Failed to read the data in file {path:#?} due to the error:\n{error}",
                path = path2.unwrap()
            )),
        })
    }
}
