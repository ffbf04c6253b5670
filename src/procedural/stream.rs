// procedural/stream.rs — big-endian binary primitives
//
// Fixed-width integers and IEEE floats in network byte order, booleans as a
// single byte, and strings as an unsigned 16-bit byte length followed by
// UTF-8.

use std::io::{Read, Write};

use crate::error::{ProcError, Result};
use crate::math::RGBColor;

pub struct DataReader<R> {
    inner: R,
}

impl<R: Read> DataReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    fn bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.bytes()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.bytes()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.bytes()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.bytes()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.bytes()?))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let [b] = self.bytes::<1>()?;
        Ok(b != 0)
    }

    pub fn read_utf(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|e| ProcError::InvalidFormat(format!("bad string: {e}")))
    }

    /// A non-negative count, rejecting negative values.
    pub fn read_count(&mut self, what: &str) -> Result<usize> {
        let n = self.read_i32()?;
        usize::try_from(n).map_err(|_| ProcError::InvalidFormat(format!("negative {what} count {n}")))
    }

    pub fn read_color(&mut self) -> Result<RGBColor> {
        Ok(RGBColor::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }
}

pub struct DataWriter<W> {
    inner: W,
}

impl<W: Write> DataWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        Ok(self.inner.write_all(&v.to_be_bytes())?)
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        Ok(self.inner.write_all(&v.to_be_bytes())?)
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        Ok(self.inner.write_all(&v.to_be_bytes())?)
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        Ok(self.inner.write_all(&v.to_be_bytes())?)
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        Ok(self.inner.write_all(&[v as u8])?)
    }

    pub fn write_utf(&mut self, s: &str) -> Result<()> {
        let len = u16::try_from(s.len())
            .map_err(|_| ProcError::InvalidFormat(format!("string of {} bytes is too long", s.len())))?;
        self.inner.write_all(&len.to_be_bytes())?;
        Ok(self.inner.write_all(s.as_bytes())?)
    }

    /// Write a count or index that must fit in an `i32`.
    pub fn write_index(&mut self, v: usize) -> Result<()> {
        let v = i32::try_from(v).map_err(|_| ProcError::InvalidFormat(format!("index {v} exceeds i32")))?;
        self.write_i32(v)
    }

    pub fn write_color(&mut self, c: RGBColor) -> Result<()> {
        self.write_f32(c.red)?;
        self.write_f32(c.green)?;
        self.write_f32(c.blue)
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.inner.flush()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_big_endian() {
        let mut buf = Vec::new();
        let mut w = DataWriter::new(&mut buf);
        w.write_i16(1).unwrap();
        w.write_i32(-2).unwrap();
        assert_eq!(buf, vec![0, 1, 0xff, 0xff, 0xff, 0xfe]);
    }

    #[test]
    fn utf_string_has_u16_length_prefix() {
        let mut buf = Vec::new();
        DataWriter::new(&mut buf).write_utf("héllo").unwrap();
        assert_eq!(&buf[..2], &[0, 6]);
        let s = DataReader::new(buf.as_slice()).read_utf().unwrap();
        assert_eq!(s, "héllo");
    }

    #[test]
    fn truncated_input_is_io_error() {
        let err = DataReader::new(&[0u8, 0, 1][..]).read_i32().unwrap_err();
        assert!(matches!(err, ProcError::Io(_)));
    }

    #[test]
    fn negative_count_is_rejected() {
        let bytes = (-1i32).to_be_bytes();
        let err = DataReader::new(&bytes[..]).read_count("module").unwrap_err();
        assert!(matches!(err, ProcError::InvalidFormat(_)));
    }
}
