//! Bounds-Checked Wire Readers
//!
//! Every decoder in this crate reads attacker-controlled bytes, so none of
//! them index into a buffer directly. They go through [`WireReader`], which
//! turns every out-of-range read into a [`WireError`] instead of a panic.
//!
//! Two encodings are covered:
//!
//! - **Binary**: little-endian integers (EtherNet/IP, SLMP binary stream)
//! - **ASCII hex**: fixed-width hexadecimal text, most significant digit
//!   first (SLMP ASCII stream)

use bytes::{BufMut, BytesMut};
use thiserror::Error;

/// Uppercase hex digits used when encoding ASCII fields.
const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Errors produced by the low-level readers.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// Fewer bytes remain than the field needs
    #[error("truncated input: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A byte in an ASCII-hex field is not a hex digit
    #[error("invalid hex digit {byte:#04x} at offset {offset}")]
    InvalidHex { offset: usize, byte: u8 },
}

/// A forward-only cursor over a byte slice.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consumes exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(WireError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            })?;

        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Consumes everything that is left.
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, WireError> {
        let [b] = self.array::<1>()?;
        Ok(b)
    }

    pub fn u16_le(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32_le(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Reads a 2-digit ASCII-hex field.
    pub fn hex_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.hex_digits(2)? as u8)
    }

    /// Reads a 4-digit ASCII-hex field.
    pub fn hex_u16(&mut self) -> Result<u16, WireError> {
        Ok(self.hex_digits(4)? as u16)
    }

    fn hex_digits(&mut self, digits: usize) -> Result<u32, WireError> {
        let start = self.pos;
        let text = self.take(digits)?;

        text.iter().enumerate().try_fold(0u32, |acc, (i, &byte)| -> Result<u32, WireError> {
            let nibble = char::from(byte)
                .to_digit(16)
                .ok_or(WireError::InvalidHex {
                    offset: start + i,
                    byte,
                })?;
            Ok((acc << 4) | nibble)
        })
    }
}

/// Appends `value` as `digits` uppercase hex characters.
pub fn put_hex(buf: &mut BytesMut, value: u32, digits: usize) {
    for shift in (0..digits).rev() {
        let nibble = (value >> (shift * 4)) & 0xF;
        buf.put_u8(HEX_DIGITS[nibble as usize]);
    }
}
