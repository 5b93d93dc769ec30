//! Flat, ordered wire format for detector parameters.
//!
//! The layout matches what an Android `Parcel` produces for the same field
//! sequence, so parameter blobs can be exchanged with the Java binding:
//!
//! | type     | encoding                                                        |
//! |----------|-----------------------------------------------------------------|
//! | `bool`   | boolean array of length one: `i32` 1, then `i32` 0 or 1          |
//! | `i32`    | 4 bytes, little endian                                          |
//! | `f32`    | 4 bytes, little endian IEEE 754                                 |
//! | `String` | `i32` UTF-16 length (-1 for null), code units, `0`, pad to 4     |

use thiserror::Error;

/// Errors produced while decoding a parameter parcel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParcelError {
    /// The input ended before a value could be read.
    #[error("unexpected end of parcel at offset {offset} (needed {needed} bytes)")]
    UnexpectedEof { offset: usize, needed: usize },

    /// A boolean was not encoded as a one-element array.
    #[error("field {field}: expected boolean array of length 1, found {len}")]
    InvalidBooleanArray { field: &'static str, len: i32 },

    /// A string length prefix was negative but not the null marker.
    #[error("field {field}: invalid string length {len}")]
    InvalidStringLength { field: &'static str, len: i32 },

    /// A string payload was not valid UTF-16.
    #[error("field {field}: string is not valid UTF-16")]
    InvalidUtf16 { field: &'static str },
}

/// Append-only parcel encoder.
#[derive(Debug, Default, Clone)]
pub struct ParcelWriter {
    buf: Vec<u8>,
}

impl ParcelWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a boolean as a one-element boolean array.
    pub fn write_bool(&mut self, value: bool) {
        self.write_i32(1);
        self.write_i32(i32::from(value));
    }

    pub fn write_string(&mut self, value: &str) {
        let units: Vec<u16> = value.encode_utf16().collect();
        self.write_i32(units.len() as i32);
        for unit in units.iter().chain(std::iter::once(&0u16)) {
            self.buf.extend_from_slice(&unit.to_le_bytes());
        }
        while self.buf.len() % 4 != 0 {
            self.buf.push(0);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over an encoded parcel.
#[derive(Debug, Clone)]
pub struct ParcelReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ParcelReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current read position in bytes.
    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ParcelError> {
        let end = self.offset + N;
        let bytes = self
            .data
            .get(self.offset..end)
            .ok_or(ParcelError::UnexpectedEof {
                offset: self.offset,
                needed: N,
            })?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.offset = end;
        Ok(out)
    }

    pub fn read_i32(&mut self) -> Result<i32, ParcelError> {
        Ok(i32::from_le_bytes(self.take::<4>()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, ParcelError> {
        Ok(f32::from_le_bytes(self.take::<4>()?))
    }

    pub fn read_bool(&mut self, field: &'static str) -> Result<bool, ParcelError> {
        let len = self.read_i32()?;
        if len != 1 {
            return Err(ParcelError::InvalidBooleanArray { field, len });
        }
        Ok(self.read_i32()? != 0)
    }

    /// Reads a string; a null string decodes as empty.
    pub fn read_string(&mut self, field: &'static str) -> Result<String, ParcelError> {
        let len = self.read_i32()?;
        if len == -1 {
            return Ok(String::new());
        }
        if len < 0 {
            return Err(ParcelError::InvalidStringLength { field, len });
        }
        let count = len as usize;
        let byte_len = (count + 1) * 2;
        if self.remaining() < byte_len {
            return Err(ParcelError::UnexpectedEof {
                offset: self.offset,
                needed: byte_len,
            });
        }
        let mut units = Vec::with_capacity(count);
        for _ in 0..count {
            units.push(u16::from_le_bytes(self.take::<2>()?));
        }
        // terminator
        self.take::<2>()?;
        let padded = self.offset.next_multiple_of(4).min(self.data.len());
        self.offset = padded;
        String::from_utf16(&units).map_err(|_| ParcelError::InvalidUtf16 { field })
    }
}

/// A value that can be stored in a parameter parcel.
pub trait ParcelField: Sized {
    fn write_field(&self, parcel: &mut ParcelWriter);
    fn read_field(parcel: &mut ParcelReader<'_>, field: &'static str) -> Result<Self, ParcelError>;
}

impl ParcelField for bool {
    fn write_field(&self, parcel: &mut ParcelWriter) {
        parcel.write_bool(*self);
    }

    fn read_field(parcel: &mut ParcelReader<'_>, field: &'static str) -> Result<Self, ParcelError> {
        parcel.read_bool(field)
    }
}

impl ParcelField for i32 {
    fn write_field(&self, parcel: &mut ParcelWriter) {
        parcel.write_i32(*self);
    }

    fn read_field(parcel: &mut ParcelReader<'_>, _field: &'static str) -> Result<Self, ParcelError> {
        parcel.read_i32()
    }
}

impl ParcelField for f32 {
    fn write_field(&self, parcel: &mut ParcelWriter) {
        parcel.write_f32(*self);
    }

    fn read_field(parcel: &mut ParcelReader<'_>, _field: &'static str) -> Result<Self, ParcelError> {
        parcel.read_f32()
    }
}

impl ParcelField for String {
    fn write_field(&self, parcel: &mut ParcelWriter) {
        parcel.write_string(self);
    }

    fn read_field(parcel: &mut ParcelReader<'_>, field: &'static str) -> Result<Self, ParcelError> {
        parcel.read_string(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_is_array_of_one() {
        let mut w = ParcelWriter::new();
        w.write_bool(true);
        assert_eq!(w.as_bytes(), &[1, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_string_layout_and_padding() {
        let mut w = ParcelWriter::new();
        w.write_string("ab");
        // len, 'a', 'b', terminator, padding
        assert_eq!(w.as_bytes(), &[2, 0, 0, 0, b'a', 0, b'b', 0, 0, 0, 0, 0]);

        let mut w = ParcelWriter::new();
        w.write_string("abc");
        assert_eq!(w.len(), 4 + 8);

        let mut r = ParcelReader::new(w.as_bytes());
        assert_eq!(r.read_string("s").unwrap(), "abc");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_null_string_reads_empty() {
        let mut w = ParcelWriter::new();
        w.write_i32(-1);
        w.write_i32(7);
        let mut r = ParcelReader::new(w.as_bytes());
        assert_eq!(r.read_string("out_dir").unwrap(), "");
        assert_eq!(r.read_i32().unwrap(), 7);
    }

    #[test]
    fn test_non_ascii_string() {
        let mut w = ParcelWriter::new();
        w.write_string("/sdcard/caf\u{e9}");
        let mut r = ParcelReader::new(w.as_bytes());
        assert_eq!(r.read_string("s").unwrap(), "/sdcard/caf\u{e9}");
    }

    #[test]
    fn test_truncated_input() {
        let mut r = ParcelReader::new(&[1, 0]);
        assert_eq!(
            r.read_i32(),
            Err(ParcelError::UnexpectedEof {
                offset: 0,
                needed: 4
            })
        );
    }

    #[test]
    fn test_bad_boolean_array() {
        let mut w = ParcelWriter::new();
        w.write_i32(2);
        w.write_i32(1);
        let mut r = ParcelReader::new(w.as_bytes());
        assert!(matches!(
            r.read_bool("debug"),
            Err(ParcelError::InvalidBooleanArray { field: "debug", len: 2 })
        ));
    }

    #[test]
    fn test_float_bits_preserved() {
        let mut w = ParcelWriter::new();
        w.write_f32(0.01);
        let mut r = ParcelReader::new(w.as_bytes());
        assert_eq!(r.read_f32().unwrap().to_bits(), 0.01f32.to_bits());
    }
}
