//! SLMP Loopback Test (Self Test) Command
//!
//! Command 0x0619 / sub-command 0x0000. The request carries a byte count and
//! that many bytes of loopback data; the response returns both unchanged.
//!
//! ```text
//!           binary          ASCII
//! count     u16 LE          4 hex chars
//! data      count bytes     count characters
//! ```

use crate::protocol::slmp::{put_u16, read_u16, EncodeError, SlmpError, StreamType};
use crate::protocol::wire::WireReader;
use bytes::{BufMut, Bytes, BytesMut};

/// Largest loopback payload a device accepts.
pub const MAX_LOOPBACK_LEN: u16 = 960;

/// A decoded loopback request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestRequest {
    /// Loopback data as it appeared on the wire
    pub data: Bytes,
}

impl SelfTestRequest {
    pub fn decode(raw: &[u8], stream: StreamType) -> Result<Self, SlmpError> {
        let mut reader = WireReader::new(raw);
        let count = read_u16(&mut reader, stream)?;

        if count == 0 || count > MAX_LOOPBACK_LEN {
            return Err(SlmpError::InvalidLoopbackLength(count));
        }

        let data = reader.take(usize::from(count))?;
        if !reader.is_empty() {
            return Err(SlmpError::TrailingBytes(reader.remaining()));
        }

        Ok(Self {
            data: Bytes::copy_from_slice(data),
        })
    }
}

/// A loopback response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestResponse {
    pub data: Bytes,
}

impl SelfTestResponse {
    /// The response echoing `request`.
    pub fn echo(request: &SelfTestRequest) -> Self {
        Self {
            data: request.data.clone(),
        }
    }

    /// Encodes the response data into an owned, exactly-sized buffer.
    pub fn encode(&self, stream: StreamType) -> Result<Bytes, EncodeError> {
        let count = u16::try_from(self.data.len())
            .ok()
            .filter(|&count| count <= MAX_LOOPBACK_LEN)
            .ok_or(EncodeError::LoopbackTooLarge(self.data.len()))?;

        let count_len = match stream {
            StreamType::Binary => 2,
            StreamType::Ascii => 4,
        };
        let mut buf = BytesMut::with_capacity(count_len + self.data.len());
        put_u16(&mut buf, stream, count);
        buf.put_slice(&self.data);
        Ok(buf.freeze())
    }
}
