use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, warn};

use crate::format::{check_version, read_preamble, Compatibility, IndexHeader, Version};
use crate::{FidxError, OffsetTable};

/// A fully materialized index file.
#[derive(Debug, Clone)]
pub struct LoadedIndex {
    pub header: IndexHeader,
    pub compatibility: Compatibility,
    pub offsets: OffsetTable,
}

/// Loads feature index files.
pub struct IndexReader {
    version: Version,
}

impl IndexReader {
    /// Reader identifying itself as `version` for the compatibility gate.
    pub fn new(version: Version) -> Self {
        Self { version }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Loads the whole offset table from `path`.
    ///
    /// # Errors
    ///
    /// - [`FidxError::Unavailable`] if the file cannot be opened.
    /// - [`FidxError::Corrupt`] if the header or table is truncated, the
    ///   byte-order flag is unknown, or the record count does not fit the file.
    /// - [`FidxError::UnsupportedVersion`] if the file needs a newer reader,
    ///   checked before the rest of the header is interpreted. No partial
    ///   table is returned.
    /// - [`FidxError::Io`] for any other read failure.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<LoadedIndex, FidxError> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "unable to open feature index file");
            FidxError::Unavailable(e)
        })?;
        let filesize = f.metadata()?.len();
        let mut r = BufReader::new(f);

        // versions are gated before anything order-dependent is decoded
        let preamble = read_preamble(&mut r)?;
        let compatibility = check_version(preamble.version, preamble.back_version, self.version)?;
        if compatibility == Compatibility::Partial {
            warn!(
                file_version = %preamble.version,
                reader_version = %self.version,
                "feature index format is newer than this reader; consider rebuilding the index"
            );
        }
        let header = preamble.read_rest(&mut r)?;
        debug!(header_len = header.header_len, order = ?header.byte_order, "index header read");

        // the body starts at the declared header length, not after the fields we know
        r.seek(SeekFrom::Start(header.header_len))?;

        let port = header.port();
        let count = port.read_u64(&mut r)?;

        let body_bytes = filesize.saturating_sub(header.header_len.saturating_add(8));
        if count > body_bytes / 8 {
            return Err(FidxError::Corrupt(format!(
                "record count {} exceeds the {} byte(s) of offset data",
                count, body_bytes
            )));
        }
        let count = usize::try_from(count)
            .map_err(|_| FidxError::Corrupt(format!("record count {} too large", count)))?;

        let offsets = port.read_i64s(&mut r, count)?;
        debug!(records = count, "records read from feature index");

        Ok(LoadedIndex {
            header,
            compatibility,
            offsets: OffsetTable::new(offsets),
        })
    }
}

impl Default for IndexReader {
    fn default() -> Self {
        Self::new(crate::VERSION)
    }
}
