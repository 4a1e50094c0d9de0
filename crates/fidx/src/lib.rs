//! # Fidx: feature index file
//!
//! Persisted mapping from a dense, 1-based feature ordinal to the offset an
//! external vector source needs to re-fetch that feature. Building the table
//! requires a full sequential scan of the source; the file exists so that
//! scan happens once.
//!
//! ## File layout (v5.0)
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ HEADER                                        │
//! │                                               │
//! │ version_major (u8) | version_minor (u8)       │
//! │ back_major (u8)    | back_minor (u8)          │
//! │ byte_order (u8: 0 = little, 1 = big)          │
//! │ header_len (u64)                              │
//! │ ... reserved bytes up to header_len ...       │
//! ├───────────────────────────────────────────────┤
//! │ BODY (starts at absolute offset header_len)   │
//! │                                               │
//! │ record_count (u64)                            │
//! │ offset (i64) ... repeated record_count times  │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Every multi-byte field is encoded in the order declared by the flag byte.
//! Readers always seek to `header_len` rather than assuming the body follows
//! the length field, so newer writers may append header fields.
//!
//! A file whose version is newer than the reader's loads with a warning as
//! long as its minimum-reader version (`back_major.back_minor`) is not;
//! otherwise loading fails with [`FidxError::UnsupportedVersion`].

mod format;
mod reader;
mod writer;

pub use format::{
    check_version, read_header, read_preamble, write_header, Compatibility, IndexHeader,
    Preamble, Version, BACK_VERSION, FIXED_HEADER_BYTES, VERSION,
};
pub use reader::{IndexReader, LoadedIndex};
pub use writer::IndexWriter;

pub use portable::ByteOrder;

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FidxError {
    /// The index file could not be opened.
    #[error("index file unavailable")]
    Unavailable(#[source] io::Error),
    /// The file was opened but its structure is truncated or invalid.
    #[error("corrupt index: {0}")]
    Corrupt(String),
    /// The file requires a newer reader than this one.
    #[error(
        "feature index format version {file} is not supported by reader version {reader} \
         (requires at least {back})"
    )]
    UnsupportedVersion {
        file: Version,
        back: Version,
        reader: Version,
    },
    /// Any other I/O failure while reading or writing the file.
    #[error("io error")]
    Io(#[from] io::Error),
}

impl FidxError {
    /// `true` when the index can simply be rebuilt from the source, i.e. the
    /// caller may degrade to sequential access instead of aborting. Only a
    /// file written for a newer reader is not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FidxError::UnsupportedVersion { .. })
    }
}

impl From<portable::PortError> for FidxError {
    fn from(e: portable::PortError) -> Self {
        match e {
            portable::PortError::Io(e) if e.kind() != io::ErrorKind::UnexpectedEof => {
                FidxError::Io(e)
            }
            other => FidxError::Corrupt(other.to_string()),
        }
    }
}

/// Ordinal → offset table. Ordinals are dense and start at 1.
///
/// The table is immutable once built; read paths only look offsets up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    offsets: Vec<i64>,
}

impl OffsetTable {
    pub fn new(offsets: Vec<i64>) -> Self {
        Self { offsets }
    }

    /// Offset of the feature with the given 1-based ordinal.
    pub fn get(&self, ordinal: u64) -> Option<i64> {
        let idx = ordinal.checked_sub(1)?;
        self.offsets.get(usize::try_from(idx).ok()?).copied()
    }

    /// Number of indexed features (the header's record count).
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// `(ordinal, offset)` pairs in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, i64)> + '_ {
        self.offsets
            .iter()
            .enumerate()
            .map(|(i, off)| (i as u64 + 1, *off))
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.offsets
    }
}

impl FromIterator<i64> for OffsetTable {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
