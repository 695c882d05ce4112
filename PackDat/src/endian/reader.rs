//! Endian-aware primitive reader with position tracking

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use half::f16;

use super::{ByteOrder, Decimal128, UNNAMED_SOURCE, check_width};
use crate::error::{Error, Result};

/// Generates a fixed-width read that dispatches on the configured order.
macro_rules! read_ordered {
    ($(#[$doc:meta])* $name:ident -> $ty:ty, $width:expr) => {
        $(#[$doc])*
        pub fn $name(&mut self) -> Result<$ty> {
            let value = match self.order {
                ByteOrder::Little => self.inner.$name::<LittleEndian>(),
                ByteOrder::Big => self.inner.$name::<BigEndian>(),
            };
            self.track($width, value)
        }
    };
}

/// Reads primitives in one byte order, remembering where it is.
///
/// The tracked position starts at zero (or wherever [`EndianReader::at`]
/// says) and advances with every successful read; seeks through
/// [`EndianReader::seek_to`] keep it in sync with the underlying stream.
pub struct EndianReader<R> {
    inner: R,
    order: ByteOrder,
    position: u64,
    source: String,
}

impl<R: Read> EndianReader<R> {
    /// Create a reader positioned at byte 0 of `inner`.
    pub fn new(inner: R, order: ByteOrder) -> Self {
        Self {
            inner,
            order,
            position: 0,
            source: UNNAMED_SOURCE.to_string(),
        }
    }

    /// Name used in error messages (usually the file path).
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Declare that `inner` is already positioned at `position`.
    #[must_use]
    pub fn at(mut self, position: u64) -> Self {
        self.position = position;
        self
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Absolute position of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Advance the position on success, or turn a short read into
    /// [`Error::UnexpectedEof`] at the position the read started from.
    fn track<T>(&mut self, width: u64, result: io::Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.position += width;
                Ok(value)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(self.eof()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn eof(&self) -> Error {
        Error::UnexpectedEof {
            file: self.source.clone(),
            position: self.position,
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.inner.read_u8();
        self.track(1, value)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        let value = self.inner.read_i8();
        self.track(1, value)
    }

    read_ordered!(read_u16 -> u16, 2);
    read_ordered!(read_i16 -> i16, 2);
    read_ordered!(read_u32 -> u32, 4);
    read_ordered!(read_i32 -> i32, 4);
    read_ordered!(read_u64 -> u64, 8);
    read_ordered!(read_i64 -> i64, 8);
    read_ordered!(read_f32 -> f32, 4);
    read_ordered!(read_f64 -> f64, 8);

    /// Read an unsigned integer stored in `nbytes` bytes (1-8).
    pub fn read_uint(&mut self, nbytes: usize) -> Result<u64> {
        check_width(nbytes)?;
        let value = match self.order {
            ByteOrder::Little => self.inner.read_uint::<LittleEndian>(nbytes),
            ByteOrder::Big => self.inner.read_uint::<BigEndian>(nbytes),
        };
        self.track(nbytes as u64, value)
    }

    /// Read a sign-extended integer stored in `nbytes` bytes (1-8).
    pub fn read_int(&mut self, nbytes: usize) -> Result<i64> {
        check_width(nbytes)?;
        let value = match self.order {
            ByteOrder::Little => self.inner.read_int::<LittleEndian>(nbytes),
            ByteOrder::Big => self.inner.read_int::<BigEndian>(nbytes),
        };
        self.track(nbytes as u64, value)
    }

    /// Read an IEEE 754 half-precision float.
    pub fn read_f16(&mut self) -> Result<f16> {
        self.read_u16().map(f16::from_bits)
    }

    /// Read a 128-bit decimal as four words (lo, mid, hi, flags).
    pub fn read_decimal(&mut self) -> Result<Decimal128> {
        let lo = self.read_u32()?;
        let mid = self.read_u32()?;
        let hi = self.read_u32()?;
        let flags = self.read_u32()?;
        Ok(Decimal128::from_words(lo, mid, hi, flags))
    }

    /// Read exactly `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        let result = self.inner.read_exact(&mut buffer);
        self.track(len as u64, result)?;
        Ok(buffer)
    }

    /// Read `len` bytes and decode them as UTF-8.
    pub fn read_utf8(&mut self, len: usize) -> Result<String> {
        let start = self.position;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::malformed(&self.source, start, format!("name is not UTF-8: {e}")))
    }

    /// Read an `i32` length prefix followed by that many UTF-8 bytes.
    ///
    /// A negative length or one above `max_len` is a malformed record.
    pub fn read_prefixed_string(&mut self, max_len: usize) -> Result<String> {
        let start = self.position;
        let len = self.read_i32()?;
        let len = usize::try_from(len)
            .ok()
            .filter(|&len| len <= max_len)
            .ok_or_else(|| {
                Error::malformed(
                    &self.source,
                    start,
                    format!("string length {len} outside 0..={max_len}"),
                )
            })?;
        self.read_utf8(len)
    }

    /// Consume and discard `count` bytes.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        let copied = io::copy(&mut (&mut self.inner).take(count), &mut io::sink())?;
        if copied < count {
            let error = Error::UnexpectedEof {
                file: self.source.clone(),
                position: self.position + copied,
            };
            self.position += copied;
            return Err(error);
        }
        self.position += count;
        Ok(())
    }
}

impl<R: Read + Seek> EndianReader<R> {
    /// Move to an absolute offset.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.position = self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Total length of the underlying stream; the read position is kept.
    pub fn stream_len(&mut self) -> Result<u64> {
        let len = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(self.position))?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_big_and_little_endian() {
        let bytes = [0x00, 0x00, 0x01, 0x02];
        let mut big = EndianReader::new(Cursor::new(&bytes), ByteOrder::Big);
        assert_eq!(big.read_u32().unwrap(), 0x0102);

        let mut little = EndianReader::new(Cursor::new(&bytes), ByteOrder::Little);
        assert_eq!(little.read_u32().unwrap(), 0x0201_0000);
        assert_eq!(little.position(), 4);
    }

    #[test]
    fn test_odd_widths() {
        let bytes = [0xFF, 0xFF, 0xFE, 0x01, 0x02, 0x03];
        let mut reader = EndianReader::new(Cursor::new(&bytes), ByteOrder::Big);
        assert_eq!(reader.read_int(3).unwrap(), -2);
        assert_eq!(reader.read_uint(3).unwrap(), 0x010203);
        assert!(matches!(reader.read_uint(9), Err(Error::Io(_))));
    }

    #[test]
    fn test_half_float() {
        let half = f16::from_f32(1.5).to_bits().to_le_bytes();
        let mut reader = EndianReader::new(Cursor::new(&half), ByteOrder::Little);
        assert!((reader.read_f16().unwrap().to_f32() - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_eof_reports_source_and_position() {
        let bytes = [1u8, 2, 3, 4, 5];
        let mut reader =
            EndianReader::new(Cursor::new(&bytes), ByteOrder::Little).with_source("test.pack");
        reader.read_u32().unwrap();
        match reader.read_u32() {
            Err(Error::UnexpectedEof { file, position }) => {
                assert_eq!(file, "test.pack");
                assert_eq!(position, 4);
            }
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
    }

    #[test]
    fn test_prefixed_string_limits() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&5i32.to_be_bytes());
        bytes.extend_from_slice(b"a.txt");
        bytes.extend_from_slice(&200i32.to_be_bytes());
        let mut reader = EndianReader::new(Cursor::new(&bytes), ByteOrder::Big);
        assert_eq!(reader.read_prefixed_string(128).unwrap(), "a.txt");
        assert!(matches!(
            reader.read_prefixed_string(128),
            Err(Error::MalformedRecord { position: 9, .. })
        ));
    }

    #[test]
    fn test_skip_past_end() {
        let bytes = [0u8; 3];
        let mut reader = EndianReader::new(Cursor::new(&bytes), ByteOrder::Little);
        reader.skip(2).unwrap();
        assert!(matches!(reader.skip(4), Err(Error::UnexpectedEof { position: 3, .. })));
    }

    #[test]
    fn test_seek_keeps_position() {
        let bytes = [0u8, 0, 0, 7, 0, 0, 0, 9];
        let mut reader = EndianReader::new(Cursor::new(&bytes), ByteOrder::Big);
        reader.seek_to(4).unwrap();
        assert_eq!(reader.position(), 4);
        assert_eq!(reader.stream_len().unwrap(), 8);
        assert_eq!(reader.read_u32().unwrap(), 9);
    }
}
