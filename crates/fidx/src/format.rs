//! Feature index header: version numbers, byte-order flag and header length.

use portable::{ByteOrder, Port};
use std::fmt;
use std::io::{self, Read, Write};

use crate::FidxError;

/// A `major.minor` format version. Ordering is lexicographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Format version written by this crate, and the default reader version.
pub const VERSION: Version = Version::new(5, 0);

/// Oldest reader able to load files written by this crate.
pub const BACK_VERSION: Version = Version::new(5, 0);

/// Bytes occupied by the fields every version carries: five single-byte
/// fields plus the 8-byte header length.
pub const FIXED_HEADER_BYTES: u64 = 5 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    /// Version the file was written with.
    pub version: Version,
    /// Minimum reader version able to load the file.
    pub back_version: Version,
    /// Declared order of every multi-byte field.
    pub byte_order: ByteOrder,
    /// Absolute offset of the body (record count), counted from file start.
    pub header_len: u64,
}

impl IndexHeader {
    /// Header for a file written by this crate, without reserved bytes.
    pub fn current(byte_order: ByteOrder) -> Self {
        Self {
            version: VERSION,
            back_version: BACK_VERSION,
            byte_order,
            header_len: FIXED_HEADER_BYTES,
        }
    }

    /// Codec for the body of this file.
    pub fn port(&self) -> Port {
        Port::new(self.byte_order)
    }
}

/// Outcome of comparing a file's versions against a reader's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// The file is not newer than the reader.
    Full,
    /// The file is newer but declares this reader sufficient; fields added
    /// after the reader's version are skipped.
    Partial,
}

/// The five order-independent bytes every version starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    pub version: Version,
    pub back_version: Version,
    /// Raw byte-order flag; only meaningful once the versions are accepted.
    pub order_flag: u8,
}

impl Preamble {
    /// Decodes the byte-order flag and header length that follow the
    /// preamble.
    ///
    /// After this call `r` is positioned just past the header length field,
    /// not at the body; callers must seek to `header_len`.
    pub fn read_rest<R: Read>(self, r: &mut R) -> Result<IndexHeader, FidxError> {
        let byte_order = ByteOrder::from_flag(self.order_flag).ok_or_else(|| {
            FidxError::Corrupt(format!("unknown byte order flag {}", self.order_flag))
        })?;

        let header_len = Port::new(byte_order).read_u64(r)?;
        if header_len < FIXED_HEADER_BYTES {
            return Err(FidxError::Corrupt(format!(
                "header length {} shorter than {} fixed bytes",
                header_len, FIXED_HEADER_BYTES
            )));
        }

        Ok(IndexHeader {
            version: self.version,
            back_version: self.back_version,
            byte_order,
            header_len,
        })
    }
}

/// Applies the version gate to a file's version and minimum-reader version.
///
/// # Errors
///
/// [`FidxError::UnsupportedVersion`] when both are newer than `reader`.
pub fn check_version(
    version: Version,
    back_version: Version,
    reader: Version,
) -> Result<Compatibility, FidxError> {
    if version <= reader {
        Ok(Compatibility::Full)
    } else if back_version <= reader {
        Ok(Compatibility::Partial)
    } else {
        Err(FidxError::UnsupportedVersion {
            file: version,
            back: back_version,
            reader,
        })
    }
}

/// Reads the version bytes and the raw byte-order flag from the start of `r`.
pub fn read_preamble<R: Read>(r: &mut R) -> Result<Preamble, FidxError> {
    let bytes = Port::native().read_bytes(r, 5)?;
    Ok(Preamble {
        version: Version::new(bytes[0], bytes[1]),
        back_version: Version::new(bytes[2], bytes[3]),
        order_flag: bytes[4],
    })
}

/// Reads the whole header from the start of `r` without applying the
/// version gate.
pub fn read_header<R: Read>(r: &mut R) -> Result<IndexHeader, FidxError> {
    read_preamble(r)?.read_rest(r)
}

/// Writes `header`, zero-filling any reserved bytes up to `header_len`.
pub fn write_header<W: Write>(w: &mut W, header: &IndexHeader) -> io::Result<()> {
    if header.header_len < FIXED_HEADER_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "header length shorter than fixed header",
        ));
    }
    w.write_all(&[
        header.version.major,
        header.version.minor,
        header.back_version.major,
        header.back_version.minor,
        header.byte_order.flag(),
    ])?;
    header.port().write_u64s(w, &[header.header_len])?;

    let reserved = header.header_len - FIXED_HEADER_BYTES;
    io::copy(&mut io::repeat(0).take(reserved), w)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_or_older_version_is_full() {
        let reader = Version::new(5, 0);
        for v in [Version::new(5, 0), Version::new(4, 9), Version::new(1, 0)] {
            assert_eq!(
                check_version(v, v, reader).unwrap(),
                Compatibility::Full
            );
        }
    }

    #[test]
    fn newer_version_within_back_compat_is_partial() {
        let reader = Version::new(3, 0);
        let gate = check_version(Version::new(4, 0), Version::new(3, 0), reader);
        assert_eq!(gate.unwrap(), Compatibility::Partial);
    }

    #[test]
    fn newer_back_version_is_unsupported() {
        let reader = Version::new(3, 0);
        match check_version(Version::new(4, 0), Version::new(4, 0), reader) {
            Err(FidxError::UnsupportedVersion { file, back, reader }) => {
                assert_eq!(file, Version::new(4, 0));
                assert_eq!(back, Version::new(4, 0));
                assert_eq!(reader, Version::new(3, 0));
            }
            other => panic!("expected unsupported version, got {:?}", other),
        }
    }

    #[test]
    fn minor_versions_compare_lexicographically() {
        // 4.1 is newer than 3.5 even though its minor is smaller
        let reader = Version::new(3, 5);
        assert!(check_version(Version::new(4, 1), Version::new(3, 9), reader).is_err());
        assert_eq!(
            check_version(Version::new(3, 6), Version::new(3, 1), reader).unwrap(),
            Compatibility::Partial
        );
    }

    #[test]
    fn header_bytes_follow_declared_order() {
        let mut buf = Vec::new();
        let h = IndexHeader::current(ByteOrder::Big);
        write_header(&mut buf, &h).unwrap();
        assert_eq!(buf.len() as u64, FIXED_HEADER_BYTES);
        assert_eq!(&buf[..5], &[5, 0, 5, 0, 1]);
        assert_eq!(&buf[5..], &[0, 0, 0, 0, 0, 0, 0, 13]);

        let back = read_header(&mut &buf[..]).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn reserved_bytes_are_zero_filled() {
        let mut buf = Vec::new();
        let h = IndexHeader {
            header_len: FIXED_HEADER_BYTES + 7,
            ..IndexHeader::current(ByteOrder::Little)
        };
        write_header(&mut buf, &h).unwrap();
        assert_eq!(buf.len() as u64, FIXED_HEADER_BYTES + 7);
        assert!(buf[FIXED_HEADER_BYTES as usize..].iter().all(|b| *b == 0));
    }

    #[test]
    fn unknown_order_flag_is_corrupt() {
        let buf = [5u8, 0, 5, 0, 9, 13, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            read_header(&mut &buf[..]),
            Err(FidxError::Corrupt(_))
        ));
    }

    #[test]
    fn preamble_keeps_unknown_flag_raw() {
        let buf = [9u8, 0, 9, 0, 2];
        let preamble = read_preamble(&mut &buf[..]).unwrap();
        assert_eq!(preamble.version, Version::new(9, 0));
        assert_eq!(preamble.back_version, Version::new(9, 0));
        assert_eq!(preamble.order_flag, 2);
    }

    #[test]
    fn short_header_length_is_corrupt() {
        let mut buf = vec![5u8, 0, 5, 0, 0];
        buf.extend_from_slice(&4u64.to_le_bytes());
        assert!(matches!(
            read_header(&mut &buf[..]),
            Err(FidxError::Corrupt(_))
        ));
    }

    #[test]
    fn truncated_header_is_corrupt() {
        let buf = [5u8, 0, 5];
        assert!(matches!(
            read_header(&mut &buf[..]),
            Err(FidxError::Corrupt(_))
        ));
    }
}
