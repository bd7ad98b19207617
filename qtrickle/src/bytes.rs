//! Utilities for decoding from and encoding into bytes.
//!
//! Defines the (de)serialization traits [`ToBytes`] and [`FromBytes`] as well as the helper structs
//! [`ByteWriter`] and [`ByteReader`], which wrap a `&mut [u8]` or `&[u8]` and offer utilities to
//! write and read little-endian values. They are used for the telemetry records the timer emits
//! over the debug channel.
//!
//! [`ToBytes`]: trait.ToBytes.html
//! [`FromBytes`]: trait.FromBytes.html
//! [`ByteWriter`]: struct.ByteWriter.html
//! [`ByteReader`]: struct.ByteReader.html

use crate::Error;
use byteorder::{ByteOrder, LittleEndian};
use core::mem;

/// Cursor encoding little-endian values into a borrowed buffer.
///
/// Every `write_*` method fails with `Error::Eof`, and writes nothing, once the value does not fit
/// in the remaining buffer.
pub struct ByteWriter<'a>(&'a mut [u8]);

impl<'a> ByteWriter<'a> {
    /// Creates a writer that will write to `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        ByteWriter(buf)
    }

    /// Returns the number of bytes that can be written to `self` until it is full.
    pub fn space_left(&self) -> usize {
        self.0.len()
    }

    /// Writes all bytes from `other` to `self`.
    ///
    /// Returns `Error::Eof` when `self` does not have enough space left to fit `other`. In that
    /// case, `self` will not be modified.
    pub fn write_slice(&mut self, other: &[u8]) -> Result<(), Error> {
        if self.space_left() < other.len() {
            Err(Error::Eof)
        } else {
            self.0[..other.len()].copy_from_slice(other);
            let this = mem::take(&mut self.0);
            self.0 = &mut this[other.len()..];
            Ok(())
        }
    }

    /// Writes a single byte to `self`.
    pub fn write_u8(&mut self, byte: u8) -> Result<(), Error> {
        self.write_slice(&[byte])
    }

    /// Writes an `i8` to `self` (two's complement).
    pub fn write_i8(&mut self, value: i8) -> Result<(), Error> {
        self.write_slice(&value.to_le_bytes())
    }

    /// Writes a little-endian `u16`.
    pub fn write_u16_le(&mut self, value: u16) -> Result<(), Error> {
        let mut buf = [0; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.write_slice(&buf)
    }

    /// Writes a little-endian `u32`.
    pub fn write_u32_le(&mut self, value: u32) -> Result<(), Error> {
        let mut buf = [0; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.write_slice(&buf)
    }
}

/// Allows reading values from a borrowed byte slice.
pub struct ByteReader<'a>(&'a [u8]);

impl<'a> ByteReader<'a> {
    /// Creates a new `ByteReader` that will read from the given byte slice.
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteReader(bytes)
    }

    /// Returns the number of bytes that can still be read from `self`.
    pub fn bytes_left(&self) -> usize {
        self.0.len()
    }

    /// Returns whether `self` is at the end of the underlying buffer (EOF).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reads a byte slice of length `len` from `self`.
    ///
    /// If `self` contains less than `len` bytes, `Error::Eof` will be returned and `self` will not
    /// be modified.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if self.bytes_left() < len {
            Err(Error::Eof)
        } else {
            let (head, tail) = self.0.split_at(len);
            self.0 = tail;
            Ok(head)
        }
    }

    /// Reads a single `u8` from `self`.
    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.read_slice(1)?[0])
    }

    /// Reads a single `i8` from `self`.
    pub fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.read_u8()? as i8)
    }

    /// Reads a little-endian `u16`.
    pub fn read_u16_le(&mut self) -> Result<u16, Error> {
        Ok(LittleEndian::read_u16(self.read_slice(2)?))
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32_le(&mut self) -> Result<u32, Error> {
        Ok(LittleEndian::read_u32(self.read_slice(4)?))
    }
}

/// Values with a fixed byte encoding.
pub trait ToBytes {
    /// Encodes `self` into `writer`.
    ///
    /// When the value does not fit, `Error::Eof` is returned and a prefix of the encoding may
    /// already have been written.
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error>;
}

/// Values that can be decoded from their byte encoding.
pub trait FromBytes<'a>: Sized {
    /// Decodes a `Self` from `bytes`, consuming the encoded value.
    ///
    /// On error (truncated or invalid data), the position of `bytes` is unspecified.
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let mut buf = [0; 8];
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_u8(0xab).unwrap();
        writer.write_u16_le(0x1234).unwrap();
        writer.write_u32_le(0xdead_beef).unwrap();
        writer.write_i8(-1).unwrap();
        assert_eq!(writer.space_left(), 0);
        assert_eq!(writer.write_u8(0), Err(Error::Eof));
        assert_eq!(buf, [0xab, 0x34, 0x12, 0xef, 0xbe, 0xad, 0xde, 0xff]);

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_u8().unwrap(), 0xab);
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
        assert_eq!(reader.read_u32_le().unwrap(), 0xdead_beef);
        assert_eq!(reader.read_i8().unwrap(), -1);
        assert!(reader.is_empty());
        assert_eq!(reader.read_u8(), Err(Error::Eof));
    }

    #[test]
    fn short_write_leaves_buffer_untouched() {
        let mut buf = [0; 3];
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_u16_le(0xffff).unwrap();
        assert_eq!(writer.write_u32_le(1), Err(Error::Eof));
        assert_eq!(writer.space_left(), 1);
    }
}
