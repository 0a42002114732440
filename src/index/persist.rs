//! On-disk index bundle format (spec.md §6 "Index file").
//!
//! A bundle is a magic number, a format version, and a sequence of
//! length-prefixed blocks padded to 16-byte alignment so each block's raw
//! bytes could in principle be mapped directly. Loading a bundle whose
//! version does not match [`FORMAT_VERSION`] is fatal (spec.md §6: "a
//! version mismatch is not a recoverable condition").

use std::fmt;
use std::io::{self, Read, Write};

const MAGIC: [u8; 8] = *b"GEMIDX01";
pub const FORMAT_VERSION: u32 = 1;
const ALIGNMENT: usize = 16;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[repr(u32)]
pub enum BlockKind {
    ForwardText = 0,
    Bwt = 1,
    SampledSuffixArray = 2,
    RankMTable = 3,
    LocatorSpans = 4,
}

impl BlockKind {
    fn from_tag(tag: u32) -> Result<Self, PersistError> {
        Ok(match tag {
            0 => BlockKind::ForwardText,
            1 => BlockKind::Bwt,
            2 => BlockKind::SampledSuffixArray,
            3 => BlockKind::RankMTable,
            4 => BlockKind::LocatorSpans,
            other => return Err(PersistError::UnknownBlockKind(other)),
        })
    }
}

#[derive(Debug)]
pub enum PersistError {
    Io(io::Error),
    BadMagic,
    VersionMismatch { found: u32, expected: u32 },
    UnknownBlockKind(u32),
    Truncated,
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::Io(e) => write!(f, "index bundle I/O error: {e}"),
            PersistError::BadMagic => write!(f, "not a GEM index bundle (bad magic)"),
            PersistError::VersionMismatch { found, expected } => {
                write!(f, "index bundle format version {found} is incompatible with this binary (expects {expected})")
            }
            PersistError::UnknownBlockKind(tag) => write!(f, "unknown index bundle block kind {tag}"),
            PersistError::Truncated => write!(f, "index bundle is truncated"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PersistError {
    fn from(e: io::Error) -> Self {
        PersistError::Io(e)
    }
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(ALIGNMENT) * ALIGNMENT
}

/// Writes one block: a `u32` kind tag, a `u64` payload length, the payload,
/// then zero padding out to the next 16-byte boundary.
fn write_block<W: Write>(writer: &mut W, kind: BlockKind, payload: &[u8]) -> Result<(), PersistError> {
    writer.write_all(&(kind as u32).to_le_bytes())?;
    writer.write_all(&(payload.len() as u64).to_le_bytes())?;
    writer.write_all(payload)?;
    let pad = padded_len(payload.len()) - payload.len();
    writer.write_all(&vec![0u8; pad])?;
    Ok(())
}

fn read_block<R: Read>(reader: &mut R) -> Result<(BlockKind, Vec<u8>), PersistError> {
    let mut tag_buf = [0u8; 4];
    reader.read_exact(&mut tag_buf).map_err(|_| PersistError::Truncated)?;
    let kind = BlockKind::from_tag(u32::from_le_bytes(tag_buf))?;

    let mut len_buf = [0u8; 8];
    reader.read_exact(&mut len_buf).map_err(|_| PersistError::Truncated)?;
    let len = u64::from_le_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).map_err(|_| PersistError::Truncated)?;

    let pad = padded_len(len) - len;
    if pad > 0 {
        let mut discard = vec![0u8; pad];
        reader.read_exact(&mut discard).map_err(|_| PersistError::Truncated)?;
    }

    Ok((kind, payload))
}

/// Raw blocks extracted from a bundle, keyed by [`BlockKind`], before the
/// caller reconstructs typed index structures from them.
pub struct BundleBlocks {
    pub forward_text: Vec<u8>,
    pub bwt: Vec<u8>,
    pub sampled_suffix_array: Vec<u8>,
    pub rank_mtable: Vec<u8>,
    pub locator_spans: Vec<u8>,
}

pub fn write_bundle<W: Write>(writer: &mut W, blocks: &BundleBlocks) -> Result<(), PersistError> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    write_block(writer, BlockKind::ForwardText, &blocks.forward_text)?;
    write_block(writer, BlockKind::Bwt, &blocks.bwt)?;
    write_block(writer, BlockKind::SampledSuffixArray, &blocks.sampled_suffix_array)?;
    write_block(writer, BlockKind::RankMTable, &blocks.rank_mtable)?;
    write_block(writer, BlockKind::LocatorSpans, &blocks.locator_spans)?;
    Ok(())
}

pub fn read_bundle<R: Read>(reader: &mut R) -> Result<BundleBlocks, PersistError> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic).map_err(|_| PersistError::Truncated)?;
    if magic != MAGIC {
        return Err(PersistError::BadMagic);
    }

    let mut version_buf = [0u8; 4];
    reader.read_exact(&mut version_buf).map_err(|_| PersistError::Truncated)?;
    let version = u32::from_le_bytes(version_buf);
    if version != FORMAT_VERSION {
        return Err(PersistError::VersionMismatch {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let mut found = [None, None, None, None, None];
    for _ in 0..5 {
        let (kind, payload) = read_block(reader)?;
        let slot = match kind {
            BlockKind::ForwardText => 0,
            BlockKind::Bwt => 1,
            BlockKind::SampledSuffixArray => 2,
            BlockKind::RankMTable => 3,
            BlockKind::LocatorSpans => 4,
        };
        found[slot] = Some(payload);
    }

    Ok(BundleBlocks {
        forward_text: found[0].take().ok_or(PersistError::Truncated)?,
        bwt: found[1].take().ok_or(PersistError::Truncated)?,
        sampled_suffix_array: found[2].take().ok_or(PersistError::Truncated)?,
        rank_mtable: found[3].take().ok_or(PersistError::Truncated)?,
        locator_spans: found[4].take().ok_or(PersistError::Truncated)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_blocks() {
        let blocks = BundleBlocks {
            forward_text:         vec![0, 1, 2, 3, 5],
            bwt:                  vec![3, 1, 0, 2],
            sampled_suffix_array: vec![9, 9, 9],
            rank_mtable:          vec![1, 2, 3, 4, 5, 6, 7],
            locator_spans:        b"chr1\0".to_vec(),
        };
        let mut buf = Vec::new();
        write_bundle(&mut buf, &blocks).unwrap();
        assert_eq!(buf.len() % ALIGNMENT, (MAGIC.len() + 4) % ALIGNMENT);

        let read_back = read_bundle(&mut &buf[..]).unwrap();
        assert_eq!(read_back.forward_text, blocks.forward_text);
        assert_eq!(read_back.bwt, blocks.bwt);
        assert_eq!(read_back.sampled_suffix_array, blocks.sampled_suffix_array);
        assert_eq!(read_back.rank_mtable, blocks.rank_mtable);
        assert_eq!(read_back.locator_spans, blocks.locator_spans);
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = vec![0u8; 32];
        assert!(matches!(read_bundle(&mut &buf[..]), Err(PersistError::BadMagic)));
    }

    #[test]
    fn rejects_version_mismatch() {
        let mut buf = MAGIC.to_vec();
        buf.extend_from_slice(&999u32.to_le_bytes());
        let err = read_bundle(&mut &buf[..]).unwrap_err();
        assert!(matches!(err, PersistError::VersionMismatch { found: 999, .. }));
    }
}
