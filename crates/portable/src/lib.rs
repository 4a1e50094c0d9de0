//! # Portable
//!
//! Fixed-width integer encoding in an explicitly declared byte order.
//!
//! Files written by one host must be readable on any other, so the byte
//! order of multi-byte fields is recorded in the file itself (a single flag
//! byte) and every read goes through a [`Port`] carrying that order. There
//! is no ambient "current port": callers construct a [`Port`] from the
//! declared flag and pass it to every read.
//!
//! ## Example
//! ```rust
//! use portable::{ByteOrder, Port};
//!
//! let port = Port::new(ByteOrder::Big);
//! let mut buf = Vec::new();
//! port.write_i64s(&mut buf, &[1, -2]).unwrap();
//! assert_eq!(&buf[..8], &[0, 0, 0, 0, 0, 0, 0, 1]);
//!
//! let back = port.read_i64s(&mut &buf[..], 2).unwrap();
//! assert_eq!(back, vec![1, -2]);
//! ```

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

/// Byte order of multi-byte fields, as declared by a file's flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Flag byte value for little-endian data.
    pub const LITTLE_FLAG: u8 = 0;
    /// Flag byte value for big-endian data.
    pub const BIG_FLAG: u8 = 1;

    /// Decodes a flag byte. Returns `None` for unknown values.
    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            Self::LITTLE_FLAG => Some(ByteOrder::Little),
            Self::BIG_FLAG => Some(ByteOrder::Big),
            _ => None,
        }
    }

    /// The flag byte recorded in files for this order.
    pub fn flag(self) -> u8 {
        match self {
            ByteOrder::Little => Self::LITTLE_FLAG,
            ByteOrder::Big => Self::BIG_FLAG,
        }
    }

    /// Byte order of the running host.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

#[derive(Debug, Error)]
pub enum PortError {
    #[error("truncated read: wanted {count} value(s) of {width} byte(s)")]
    Truncated { count: usize, width: usize },
    #[error("io error")]
    Io(#[from] io::Error),
}

fn truncated_or_io(e: io::Error, count: usize, width: usize) -> PortError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        PortError::Truncated { count, width }
    } else {
        PortError::Io(e)
    }
}

/// Codec for fixed-width integers in one declared byte order.
///
/// A `Port` is a plain value; it is created once per file (after the flag
/// byte has been read) and threaded through every subsequent read or write
/// of that file's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    order: ByteOrder,
}

macro_rules! fixed_width {
    ($ty:ty, $width:expr, $read_one:ident, $read_many:ident, $read_into:ident, $write_many:ident, $write_one:ident) => {
        /// Reads a single value. Fails with [`PortError::Truncated`] at EOF.
        pub fn $read_one<R: Read>(&self, r: &mut R) -> Result<$ty, PortError> {
            let res = match self.order {
                ByteOrder::Little => r.$read_one::<LittleEndian>(),
                ByteOrder::Big => r.$read_one::<BigEndian>(),
            };
            res.map_err(|e| truncated_or_io(e, 1, $width))
        }

        /// Reads exactly `count` values. Fails with [`PortError::Truncated`]
        /// when fewer bytes are available than required.
        pub fn $read_many<R: Read>(&self, r: &mut R, count: usize) -> Result<Vec<$ty>, PortError> {
            let mut out: Vec<$ty> = vec![0; count];
            let res = match self.order {
                ByteOrder::Little => r.$read_into::<LittleEndian>(&mut out),
                ByteOrder::Big => r.$read_into::<BigEndian>(&mut out),
            };
            res.map_err(|e| truncated_or_io(e, count, $width))?;
            Ok(out)
        }

        /// Writes every value in `values`.
        pub fn $write_many<W: Write>(&self, w: &mut W, values: &[$ty]) -> io::Result<()> {
            for v in values {
                match self.order {
                    ByteOrder::Little => w.$write_one::<LittleEndian>(*v)?,
                    ByteOrder::Big => w.$write_one::<BigEndian>(*v)?,
                }
            }
            Ok(())
        }
    };
}

impl Port {
    pub fn new(order: ByteOrder) -> Self {
        Self { order }
    }

    /// Port for the running host's byte order.
    pub fn native() -> Self {
        Self::new(ByteOrder::native())
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// `true` when values must be byte-swapped relative to the host.
    pub fn swaps(&self) -> bool {
        self.order != ByteOrder::native()
    }

    /// Reads `count` single bytes. Byte order does not apply.
    pub fn read_bytes<R: Read>(&self, r: &mut R, count: usize) -> Result<Vec<u8>, PortError> {
        let mut out = vec![0u8; count];
        r.read_exact(&mut out)
            .map_err(|e| truncated_or_io(e, count, 1))?;
        Ok(out)
    }

    fixed_width!(i32, 4, read_i32, read_i32s, read_i32_into, write_i32s, write_i32);
    fixed_width!(u32, 4, read_u32, read_u32s, read_u32_into, write_u32s, write_u32);
    fixed_width!(i64, 8, read_i64, read_i64s, read_i64_into, write_i64s, write_i64);
    fixed_width!(u64, 8, read_u64, read_u64s, read_u64_into, write_u64s, write_u64);
}

impl Default for Port {
    fn default() -> Self {
        Self::native()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_values() {
        assert_eq!(ByteOrder::from_flag(0), Some(ByteOrder::Little));
        assert_eq!(ByteOrder::from_flag(1), Some(ByteOrder::Big));
        assert_eq!(ByteOrder::from_flag(2), None);
        assert_eq!(ByteOrder::Big.flag(), 1);
    }

    #[test]
    fn big_endian_layout_is_explicit() {
        let port = Port::new(ByteOrder::Big);
        let mut buf = Vec::new();
        port.write_u32s(&mut buf, &[0x0102_0304]).unwrap();
        assert_eq!(buf, vec![1, 2, 3, 4]);
    }

    #[test]
    fn little_endian_layout_is_explicit() {
        let port = Port::new(ByteOrder::Little);
        let mut buf = Vec::new();
        port.write_u32s(&mut buf, &[0x0102_0304]).unwrap();
        assert_eq!(buf, vec![4, 3, 2, 1]);
    }

    // Decoding depends only on the declared order, never on the host:
    // the same bytes read through ports of both orders give swapped values,
    // whichever order the host has.
    #[test]
    fn decode_is_host_independent() {
        let values = [1i64, -1, 42, i64::MAX, i64::MIN, 0x0102_0304_0506_0708];
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let port = Port::new(order);
            let mut buf = Vec::new();
            port.write_i64s(&mut buf, &values).unwrap();

            let decoded = port.read_i64s(&mut &buf[..], values.len()).unwrap();
            assert_eq!(decoded, values);

            let other = Port::new(match order {
                ByteOrder::Little => ByteOrder::Big,
                ByteOrder::Big => ByteOrder::Little,
            });
            let swapped = other.read_i64s(&mut &buf[..], values.len()).unwrap();
            let expected: Vec<i64> = values.iter().map(|v| v.swap_bytes()).collect();
            assert_eq!(swapped, expected);
        }
    }

    #[test]
    fn exactly_one_order_swaps() {
        let swaps = [ByteOrder::Little, ByteOrder::Big]
            .into_iter()
            .filter(|o| Port::new(*o).swaps())
            .count();
        assert_eq!(swaps, 1);
        assert!(!Port::native().swaps());
    }

    #[test]
    fn short_buffer_is_truncated() {
        let port = Port::new(ByteOrder::Little);
        let buf = [0u8; 12];
        match port.read_i64s(&mut &buf[..], 2) {
            Err(PortError::Truncated { count, width }) => {
                assert_eq!(count, 2);
                assert_eq!(width, 8);
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn single_value_at_eof_is_truncated() {
        let port = Port::new(ByteOrder::Big);
        let empty: [u8; 0] = [];
        assert!(matches!(
            port.read_u64(&mut &empty[..]),
            Err(PortError::Truncated { count: 1, width: 8 })
        ));
    }

    #[test]
    fn zero_count_reads_nothing() {
        let port = Port::new(ByteOrder::Little);
        let empty: [u8; 0] = [];
        assert!(port.read_i32s(&mut &empty[..], 0).unwrap().is_empty());
    }

    #[test]
    fn read_bytes_ignores_order() {
        let data = [5u8, 0, 5, 0, 1];
        let a = Port::new(ByteOrder::Little).read_bytes(&mut &data[..], 5).unwrap();
        let b = Port::new(ByteOrder::Big).read_bytes(&mut &data[..], 5).unwrap();
        assert_eq!(a, b);
        assert!(Port::new(ByteOrder::Big)
            .read_bytes(&mut &data[..], 6)
            .is_err());
    }
}
