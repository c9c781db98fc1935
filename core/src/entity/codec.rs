//! Little-endian byte reader and writer used by schema-driven entities.

use crate::error::DecodeError;

/// Cursor over an input buffer.
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof {
                offset: self.offset,
                needed: len - self.remaining(),
            });
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        let offset = self.offset;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DecodeError::InvalidBool { offset, value }),
        }
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Reads a `u32` byte length followed by UTF-8 text.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        let offset = self.offset;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { offset })
    }

    /// Fails if any input is left unread.
    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(DecodeError::TrailingBytes {
                offset: self.offset,
                remaining,
            }),
        }
    }
}

/// Growable output buffer.
#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a `u32` byte length followed by the UTF-8 text.
    ///
    /// The caller checks that the length fits in a `u32`.
    pub fn write_string(&mut self, value: &str) {
        self.write_u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_what_writer_wrote() {
        let mut w = ByteWriter::new();
        w.write_bool(true);
        w.write_u8(7);
        w.write_i32(-5);
        w.write_u32(0xDEAD_BEEF);
        w.write_f32(1.5);
        w.write_string("héllo");
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_u8().unwrap(), 7);
        assert_eq!(r.read_i32().unwrap(), -5);
        assert_eq!(r.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert_eq!(r.read_string().unwrap(), "héllo");
        r.finish().unwrap();
    }

    #[test]
    fn little_endian_layout() {
        let mut w = ByteWriter::new();
        w.write_u32(1);
        w.write_string("ab");
        assert_eq!(w.into_bytes(), vec![1, 0, 0, 0, 2, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn eof_reports_offset_and_shortfall() {
        let mut r = ByteReader::new(&[1, 2]);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(
            r.read_u32(),
            Err(DecodeError::UnexpectedEof {
                offset: 1,
                needed: 3
            })
        );
    }

    #[test]
    fn string_length_beyond_input() {
        let mut r = ByteReader::new(&[200, 0, 0, 0, b'x']);
        assert!(matches!(
            r.read_string(),
            Err(DecodeError::UnexpectedEof { offset: 4, .. })
        ));
    }

    #[test]
    fn invalid_bool_and_utf8() {
        let mut r = ByteReader::new(&[2]);
        assert_eq!(
            r.read_bool(),
            Err(DecodeError::InvalidBool {
                offset: 0,
                value: 2
            })
        );

        let mut r = ByteReader::new(&[1, 0, 0, 0, 0xFF]);
        assert_eq!(r.read_string(), Err(DecodeError::InvalidUtf8 { offset: 4 }));
    }

    #[test]
    fn finish_rejects_trailing_bytes() {
        let mut r = ByteReader::new(&[0, 9, 9]);
        r.read_u8().unwrap();
        assert_eq!(
            r.finish(),
            Err(DecodeError::TrailingBytes {
                offset: 1,
                remaining: 2
            })
        );
    }
}
