//! Endian-aware primitive writer

use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use half::f16;

use super::{ByteOrder, Decimal128, check_width};
use crate::error::{Error, Result};

macro_rules! write_ordered {
    ($name:ident($ty:ty), $width:expr) => {
        pub fn $name(&mut self, value: $ty) -> Result<()> {
            match self.order {
                ByteOrder::Little => self.inner.$name::<LittleEndian>(value)?,
                ByteOrder::Big => self.inner.$name::<BigEndian>(value)?,
            }
            self.written += $width;
            Ok(())
        }
    };
}

/// Writes primitives in one byte order, counting bytes written.
pub struct EndianWriter<W> {
    inner: W,
    order: ByteOrder,
    written: u64,
}

impl<W: Write> EndianWriter<W> {
    pub fn new(inner: W, order: ByteOrder) -> Self {
        Self {
            inner,
            order,
            written: 0,
        }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Bytes written through this writer so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.write_u8(value)?;
        self.written += 1;
        Ok(())
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.inner.write_i8(value)?;
        self.written += 1;
        Ok(())
    }

    write_ordered!(write_u16(u16), 2);
    write_ordered!(write_i16(i16), 2);
    write_ordered!(write_u32(u32), 4);
    write_ordered!(write_i32(i32), 4);
    write_ordered!(write_u64(u64), 8);
    write_ordered!(write_i64(i64), 8);
    write_ordered!(write_f32(f32), 4);
    write_ordered!(write_f64(f64), 8);

    /// Write the low `nbytes` bytes (1-8) of an unsigned value.
    pub fn write_uint(&mut self, value: u64, nbytes: usize) -> Result<()> {
        check_width(nbytes)?;
        if nbytes < 8 && value >> (nbytes * 8) != 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{value} does not fit in {nbytes} bytes"),
            )));
        }
        match self.order {
            ByteOrder::Little => self.inner.write_uint::<LittleEndian>(value, nbytes)?,
            ByteOrder::Big => self.inner.write_uint::<BigEndian>(value, nbytes)?,
        }
        self.written += nbytes as u64;
        Ok(())
    }

    /// Write a signed value in `nbytes` bytes (1-8), two's complement.
    pub fn write_int(&mut self, value: i64, nbytes: usize) -> Result<()> {
        check_width(nbytes)?;
        let bits = nbytes as u32 * 8;
        if nbytes < 8 && (value < -(1i64 << (bits - 1)) || value >= 1i64 << (bits - 1)) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{value} does not fit in {nbytes} bytes"),
            )));
        }
        match self.order {
            ByteOrder::Little => self.inner.write_int::<LittleEndian>(value, nbytes)?,
            ByteOrder::Big => self.inner.write_int::<BigEndian>(value, nbytes)?,
        }
        self.written += nbytes as u64;
        Ok(())
    }

    pub fn write_f16(&mut self, value: f16) -> Result<()> {
        self.write_u16(value.to_bits())
    }

    pub fn write_decimal(&mut self, value: Decimal128) -> Result<()> {
        for word in value.to_words() {
            self.write_u32(word)?;
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Write `count` zero bytes.
    pub fn write_zeros(&mut self, count: u64) -> Result<()> {
        let copied = io::copy(&mut io::repeat(0).take(count), &mut self.inner)?;
        self.written += copied;
        Ok(())
    }

    /// Write an `i32` length prefix followed by the UTF-8 bytes of `value`.
    pub fn write_prefixed_string(&mut self, value: &str, max_len: usize) -> Result<()> {
        if value.len() > max_len {
            return Err(Error::NameTooLong {
                name: value.to_string(),
                length: value.len(),
            });
        }
        self.write_i32(value.len() as i32)?;
        self.write_bytes(value.as_bytes())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

impl<W: Write + Seek> EndianWriter<W> {
    /// Move the underlying stream to an absolute offset.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Current offset of the underlying stream.
    pub fn stream_position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }
}
