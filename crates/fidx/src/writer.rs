use portable::ByteOrder;
use std::fs::{remove_file, rename, OpenOptions};
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::format::{write_header, IndexHeader, Version, BACK_VERSION, FIXED_HEADER_BYTES, VERSION};
use crate::{FidxError, OffsetTable};

/// Writes an [`OffsetTable`] to disk as a feature index file.
///
/// Defaults: little-endian, the current format version, no reserved header
/// bytes. The byte order is fixed per writer rather than taken from the host
/// so files are identical wherever they are produced.
///
/// The write is crash-safe: data is first written to a temporary file,
/// fsynced, and then atomically renamed to the final path.
#[derive(Debug, Clone)]
pub struct IndexWriter {
    byte_order: ByteOrder,
    version: Version,
    back_version: Version,
    reserved: u64,
}

impl IndexWriter {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrder::Little,
            version: VERSION,
            back_version: BACK_VERSION,
            reserved: 0,
        }
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Overrides the version pair stamped into the header.
    pub fn with_version(mut self, version: Version, back_version: Version) -> Self {
        self.version = version;
        self.back_version = back_version;
        self
    }

    /// Reserves `bytes` zeroed bytes after the fixed header fields.
    pub fn with_reserved(mut self, bytes: u64) -> Self {
        self.reserved = bytes;
        self
    }

    pub fn header(&self) -> IndexHeader {
        IndexHeader {
            version: self.version,
            back_version: self.back_version,
            byte_order: self.byte_order,
            header_len: FIXED_HEADER_BYTES + self.reserved,
        }
    }

    /// Persists `table` at `path`, replacing any existing file.
    ///
    /// # Crash Safety
    ///
    /// Writes to `<path>.tmp`, calls `sync_all()`, then atomically renames.
    /// If the process crashes mid-write the old index (if any) is untouched.
    /// A failed write removes the temporary file.
    pub fn write(&self, path: &Path, table: &OffsetTable) -> Result<(), FidxError> {
        let tmp = tmp_path(path);
        let res = self
            .write_tmp(&tmp, table)
            .and_then(|()| rename(&tmp, path).map_err(FidxError::from));
        if let Err(e) = res {
            match remove_file(&tmp) {
                Err(rm) if rm.kind() != ErrorKind::NotFound => {
                    warn!(path = %tmp.display(), error = %rm, "unable to remove temporary index file");
                }
                _ => {}
            }
            return Err(e);
        }

        debug!(path = %path.display(), records = table.len(), "feature index written");
        Ok(())
    }

    fn write_tmp(&self, tmp_path: &Path, table: &OffsetTable) -> Result<(), FidxError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp_path)?;
        let mut w = BufWriter::new(file);

        let header = self.header();
        write_header(&mut w, &header)?;

        let port = header.port();
        port.write_u64s(&mut w, &[table.len() as u64])?;
        port.write_i64s(&mut w, table.as_slice())?;

        let file = w.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}

/// `<path>.tmp`, keeping the original extension.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

impl Default for IndexWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{read_header, IndexReader};
    use anyhow::Result;
    use portable::Port;
    use std::fs::File;
    use std::io::{Read, Seek, SeekFrom};
    use tempfile::tempdir;

    #[test]
    fn file_layout_is_header_count_offsets() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("fidx");
        let table = OffsetTable::new(vec![100, 200, 300]);

        IndexWriter::new()
            .with_byte_order(ByteOrder::Big)
            .write(&path, &table)?;

        let bytes = std::fs::read(&path)?;
        assert_eq!(bytes.len() as u64, FIXED_HEADER_BYTES + 8 + 3 * 8);
        assert_eq!(&bytes[..5], &[5, 0, 5, 0, ByteOrder::BIG_FLAG]);

        let port = Port::new(ByteOrder::Big);
        let mut body = &bytes[FIXED_HEADER_BYTES as usize..];
        assert_eq!(port.read_u64(&mut body)?, 3);
        assert_eq!(port.read_i64s(&mut body, 3)?, vec![100, 200, 300]);
        Ok(())
    }

    #[test]
    fn reserved_bytes_shift_the_body() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("fidx");
        let table = OffsetTable::new(vec![5, 6]);

        IndexWriter::new().with_reserved(32).write(&path, &table)?;

        let mut f = File::open(&path)?;
        let header = read_header(&mut f)?;
        assert_eq!(header.header_len, FIXED_HEADER_BYTES + 32);
        f.seek(SeekFrom::Start(header.header_len))?;
        let mut rest = Vec::new();
        f.read_to_end(&mut rest)?;
        assert_eq!(rest.len(), 8 + 2 * 8);

        let loaded = IndexReader::default().load(&path)?;
        assert_eq!(loaded.offsets, table);
        Ok(())
    }

    #[test]
    fn rewrite_replaces_previous_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("fidx");

        IndexWriter::new().write(&path, &OffsetTable::new(vec![1, 2, 3, 4]))?;
        IndexWriter::new().write(&path, &OffsetTable::new(vec![9]))?;

        let loaded = IndexReader::default().load(&path)?;
        assert_eq!(loaded.offsets.as_slice(), &[9]);
        assert!(!tmp_path(&path).exists());
        Ok(())
    }

    #[test]
    fn temp_name_keeps_the_extension() {
        let a = tmp_path(Path::new("/data/roads.fidx"));
        let b = tmp_path(Path::new("/data/roads.idx"));
        assert_eq!(a, Path::new("/data/roads.fidx.tmp"));
        assert_ne!(a, b);
    }

    #[test]
    fn failed_write_leaves_no_temp_file() -> Result<()> {
        let dir = tempdir()?;
        // a non-empty directory cannot be replaced by the rename
        let path = dir.path().join("fidx");
        std::fs::create_dir(&path)?;
        std::fs::write(path.join("keep"), b"x")?;

        let res = IndexWriter::new().write(&path, &OffsetTable::new(vec![1, 2]));
        assert!(res.is_err());
        assert!(!tmp_path(&path).exists());
        assert!(path.join("keep").exists());
        Ok(())
    }

    #[test]
    fn stamped_version_is_read_back() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("fidx");
        IndexWriter::new()
            .with_version(Version::new(6, 2), Version::new(5, 0))
            .write(&path, &OffsetTable::new(vec![1]))?;

        let mut f = File::open(&path)?;
        let header = read_header(&mut f)?;
        assert_eq!(header.version, Version::new(6, 2));
        assert_eq!(header.back_version, Version::new(5, 0));
        Ok(())
    }
}
