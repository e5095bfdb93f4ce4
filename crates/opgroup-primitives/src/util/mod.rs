//! Binary serialization helpers.
//!
//! Compact-size integers (the 1/3/5/9-byte length prefix of the wire format),
//! a bounds-checked cursor `ByteReader`, and an append-only `ByteWriter`.

use crate::PrimitivesError;

// ---------------------------------------------------------------------------
// Compact size
// ---------------------------------------------------------------------------

/// Number of bytes the compact-size encoding of `n` occupies.
pub fn compact_size_len(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

// ---------------------------------------------------------------------------
// ByteReader
// ---------------------------------------------------------------------------

/// A cursor over a byte slice that never reads past the end.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Read exactly `n` bytes.
    ///
    /// # Arguments
    /// * `n` - Number of bytes to take.
    ///
    /// # Returns
    /// The borrowed bytes, or `UnexpectedEof` without advancing.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], PrimitivesError> {
        if n > self.remaining() {
            return Err(PrimitivesError::UnexpectedEof {
                wanted: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read a fixed-size array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], PrimitivesError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, PrimitivesError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, PrimitivesError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, PrimitivesError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, PrimitivesError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a compact-size integer, rejecting non-minimal encodings.
    pub fn read_compact_size(&mut self) -> Result<u64, PrimitivesError> {
        let (value, width) = match self.read_u8()? {
            0xff => (self.read_u64_le()?, 9),
            0xfe => (self.read_u32_le()? as u64, 5),
            0xfd => (self.read_u16_le()? as u64, 3),
            b => return Ok(b as u64),
        };
        if compact_size_len(value) != width {
            return Err(PrimitivesError::NonCanonicalCompactSize(value));
        }
        Ok(value)
    }

    /// Read a compact-size length followed by that many bytes.
    pub fn read_var_bytes(&mut self) -> Result<&'a [u8], PrimitivesError> {
        let len = self.read_compact_size()?;
        let len = usize::try_from(len).map_err(|_| PrimitivesError::UnexpectedEof {
            wanted: usize::MAX,
            remaining: self.remaining(),
        })?;
        self.read_bytes(len)
    }
}

// ---------------------------------------------------------------------------
// ByteWriter
// ---------------------------------------------------------------------------

/// An append-only buffer for wire serialization.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        ByteWriter { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ByteWriter {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u32_le(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64_le(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Append the compact-size encoding of `n`.
    pub fn write_compact_size(&mut self, n: u64) {
        match compact_size_len(n) {
            1 => self.buf.push(n as u8),
            3 => {
                self.buf.push(0xfd);
                self.buf.extend_from_slice(&(n as u16).to_le_bytes());
            }
            5 => {
                self.buf.push(0xfe);
                self.buf.extend_from_slice(&(n as u32).to_le_bytes());
            }
            _ => {
                self.buf.push(0xff);
                self.buf.extend_from_slice(&n.to_le_bytes());
            }
        }
    }

    /// Append a compact-size length prefix followed by `bytes`.
    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_compact_size(bytes.len() as u64);
        self.write_bytes(bytes);
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
