//! EtherNet/IP Encapsulation Layer
//!
//! Every EtherNet/IP message over TCP starts with a fixed 24-byte
//! encapsulation header, followed by `length` bytes of command data.
//!
//! ## Header Layout (all fields little-endian)
//!
//! ```text
//! offset  size  field
//! ──────  ────  ─────────────────
//!    0      2   command
//!    2      2   length (of the data that follows)
//!    4      4   session handle
//!    8      4   status
//!   12      8   sender context
//!   20      4   options
//! ```
//!
//! ## Decoding
//!
//! [`decode_request`] runs two layers. The outer header is always attempted;
//! for SendRRData / SendUnitData the command data is then decoded as a
//! [`SendData`] block. The layers fail independently: a broken common packet
//! never invalidates a good header.
//!
//! When the header itself cannot be decoded, [`salvage_header`] reads the
//! command and session handle from their fixed offsets so the reply can
//! still echo them.

use crate::protocol::cip::{CpfError, SendData};
use crate::protocol::wire::{WireError, WireReader};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;

/// Size of the encapsulation header.
pub const ENCAPS_HEADER_LEN: usize = 24;

/// Registered TCP port for EtherNet/IP explicit messaging.
pub const DEFAULT_PORT: u16 = 44818;

/// An encapsulation command code.
///
/// Unknown codes are preserved as-is so replies can echo them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EncapsCommand(pub u16);

impl EncapsCommand {
    pub const NOP: Self = Self(0x0000);
    pub const LIST_SERVICES: Self = Self(0x0004);
    pub const LIST_IDENTITY: Self = Self(0x0063);
    pub const LIST_INTERFACES: Self = Self(0x0064);
    pub const REGISTER_SESSION: Self = Self(0x0065);
    pub const UNREGISTER_SESSION: Self = Self(0x0066);
    pub const SEND_RR_DATA: Self = Self(0x006F);
    pub const SEND_UNIT_DATA: Self = Self(0x0070);
    pub const INDICATE_STATUS: Self = Self(0x0072);
    pub const CANCEL: Self = Self(0x0073);

    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::NOP => "NOP",
            Self::LIST_SERVICES => "ListServices",
            Self::LIST_IDENTITY => "ListIdentity",
            Self::LIST_INTERFACES => "ListInterfaces",
            Self::REGISTER_SESSION => "RegisterSession",
            Self::UNREGISTER_SESSION => "UnregisterSession",
            Self::SEND_RR_DATA => "SendRRData",
            Self::SEND_UNIT_DATA => "SendUnitData",
            Self::INDICATE_STATUS => "IndicateStatus",
            Self::CANCEL => "Cancel",
            _ => return None,
        };
        Some(name)
    }

    /// True for the commands whose data is a common packet format block.
    pub fn carries_common_packet(self) -> bool {
        matches!(self, Self::SEND_RR_DATA | Self::SEND_UNIT_DATA)
    }
}

impl fmt::Display for EncapsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}(0x{:04x})", name, self.0),
            None => write!(f, "Unknown(0x{:04x})", self.0),
        }
    }
}

/// An encapsulation status code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EncapsStatus(pub u32);

impl EncapsStatus {
    pub const SUCCESS: Self = Self(0x0000);
    pub const INVALID_COMMAND: Self = Self(0x0001);
    pub const INSUFFICIENT_MEMORY: Self = Self(0x0002);
    /// Poorly formed or incorrect data in the encapsulation data portion
    pub const INVALID_FORMAT_OR_DATA: Self = Self(0x0003);
    pub const INVALID_SESSION_HANDLE: Self = Self(0x0064);
    pub const INVALID_LENGTH: Self = Self(0x0065);
    pub const UNSUPPORTED_PROTOCOL: Self = Self(0x0069);
}

impl fmt::Display for EncapsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::SUCCESS => "Success",
            Self::INVALID_COMMAND => "InvalidCommand",
            Self::INSUFFICIENT_MEMORY => "InsufficientMemory",
            Self::INVALID_FORMAT_OR_DATA => "InvalidFormatOrData",
            Self::INVALID_SESSION_HANDLE => "InvalidSessionHandle",
            Self::INVALID_LENGTH => "InvalidLength",
            Self::UNSUPPORTED_PROTOCOL => "UnsupportedProtocol",
            _ => return write!(f, "Unknown(0x{:08x})", self.0),
        };
        write!(f, "{}(0x{:04x})", name, self.0)
    }
}

/// The fixed 24-byte encapsulation header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncapsHeader {
    pub command: EncapsCommand,
    /// Declared length of the data following the header
    pub length: u16,
    pub session_handle: u32,
    pub status: EncapsStatus,
    pub sender_context: [u8; 8],
    pub options: u32,
}

impl EncapsHeader {
    /// Decodes the header from the first 24 bytes of `buf`.
    ///
    /// Does not look at anything past the header.
    pub fn decode(buf: &[u8]) -> Result<Self, EncapsError> {
        if buf.len() < ENCAPS_HEADER_LEN {
            return Err(EncapsError::ShortHeader(buf.len()));
        }

        let mut reader = WireReader::new(buf);
        Ok(Self {
            command: EncapsCommand(reader.u16_le()?),
            length: reader.u16_le()?,
            session_handle: reader.u32_le()?,
            status: EncapsStatus(reader.u32_le()?),
            sender_context: reader.array()?,
            options: reader.u32_le()?,
        })
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.command.0);
        buf.put_u16_le(self.length);
        buf.put_u32_le(self.session_handle);
        buf.put_u32_le(self.status.0);
        buf.put_slice(&self.sender_context);
        buf.put_u32_le(self.options);
    }
}

/// A complete encapsulation message: header plus command data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncapsPacket {
    pub header: EncapsHeader,
    pub data: Bytes,
}

impl EncapsPacket {
    /// Builds a reply with no command data.
    pub fn reply(command: EncapsCommand, session_handle: u32, status: EncapsStatus) -> Self {
        Self {
            header: EncapsHeader {
                command,
                session_handle,
                status,
                ..EncapsHeader::default()
            },
            data: Bytes::new(),
        }
    }

    /// Decodes one message that must occupy all of `buf`.
    ///
    /// A header whose declared length disagrees with the bytes present is
    /// still returned inside [`EncapsError::LengthMismatch`] for diagnostics.
    pub fn decode(buf: &[u8]) -> Result<Self, EncapsError> {
        let header = EncapsHeader::decode(buf)?;
        let available = buf.len() - ENCAPS_HEADER_LEN;

        if usize::from(header.length) != available {
            return Err(EncapsError::LengthMismatch { header, available });
        }

        Ok(Self {
            header,
            data: Bytes::copy_from_slice(&buf[ENCAPS_HEADER_LEN..]),
        })
    }

    /// Serializes the packet, recomputing the length field from `data`.
    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        let length = u16::try_from(self.data.len())
            .map_err(|_| EncodeError::PayloadTooLarge(self.data.len()))?;

        let mut buf = BytesMut::with_capacity(ENCAPS_HEADER_LEN + self.data.len());
        EncapsHeader {
            length,
            ..self.header
        }
        .encode_into(&mut buf);
        buf.put_slice(&self.data);
        Ok(buf.freeze())
    }
}

/// Encapsulation-layer decode failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncapsError {
    /// Fewer than 24 bytes were received
    #[error("encapsulation header needs 24 bytes, got {0}")]
    ShortHeader(usize),

    /// The header decoded, but its length field does not match the data
    #[error("declared length {} disagrees with {available} data bytes", .header.length)]
    LengthMismatch {
        header: EncapsHeader,
        available: usize,
    },

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Failures while serializing an encapsulation message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("command data of {0} bytes does not fit the 16-bit length field")]
    PayloadTooLarge(usize),
}

/// Command and session handle recovered from an undecodable buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SalvagedHeader {
    pub command: EncapsCommand,
    pub session_handle: u32,
}

/// Reads the command and session handle from their fixed header offsets.
///
/// This path is intentionally lenient and never fails: it runs only after
/// the structured decode has rejected the buffer, and its output is used
/// solely to populate the error reply. The command needs bytes 0..2 and the
/// session handle bytes 4..8; a field whose bytes were not received reads
/// as zero.
pub fn salvage_header(buf: &[u8]) -> SalvagedHeader {
    let command = match buf {
        [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
        _ => 0,
    };
    let session_handle = match buf.get(4..8) {
        Some([a, b, c, d]) => u32::from_le_bytes([*a, *b, *c, *d]),
        _ => 0,
    };

    SalvagedHeader {
        command: EncapsCommand(command),
        session_handle,
    }
}

/// Result of running both decode layers over one received buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum EncapsDecode {
    /// The encapsulation message decoded.
    ///
    /// `nested` is present only for commands that carry a common packet.
    Parsed {
        packet: EncapsPacket,
        nested: Option<Result<SendData, CpfError>>,
    },

    /// The encapsulation message was rejected.
    Failed {
        error: EncapsError,
        salvage: SalvagedHeader,
    },
}

impl EncapsDecode {
    pub fn is_parsed(&self) -> bool {
        matches!(self, EncapsDecode::Parsed { .. })
    }
}

/// Decodes one received buffer as an encapsulation request.
pub fn decode_request(buf: &[u8]) -> EncapsDecode {
    match EncapsPacket::decode(buf) {
        Ok(packet) => {
            let nested = packet
                .header
                .command
                .carries_common_packet()
                .then(|| SendData::decode(&packet.data));
            EncapsDecode::Parsed { packet, nested }
        }
        Err(error) => EncapsDecode::Failed {
            error,
            salvage: salvage_header(buf),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(command: u16, length: u16, session: u32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        EncapsHeader {
            command: EncapsCommand(command),
            length,
            session_handle: session,
            ..EncapsHeader::default()
        }
        .encode_into(&mut buf);
        buf.to_vec()
    }

    #[test]
    fn test_decode_register_session() {
        let mut input = header_bytes(0x0065, 4, 0);
        input.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);

        let packet = EncapsPacket::decode(&input).unwrap();
        assert_eq!(packet.header.command, EncapsCommand::REGISTER_SESSION);
        assert_eq!(packet.header.length, 4);
        assert_eq!(&packet.data[..], &[0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_decode_short_header() {
        let err = EncapsPacket::decode(&[0x65, 0x00, 0x00]).unwrap_err();
        assert_eq!(err, EncapsError::ShortHeader(3));
    }

    #[test]
    fn test_declared_length_exceeds_data() {
        let mut input = header_bytes(0x006F, 32, 0xAABB_CCDD);
        input.extend_from_slice(&[0u8; 8]);

        match EncapsPacket::decode(&input) {
            Err(EncapsError::LengthMismatch { header, available }) => {
                assert_eq!(header.length, 32);
                assert_eq!(header.session_handle, 0xAABB_CCDD);
                assert_eq!(available, 8);
            }
            other => panic!("expected length mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_bytes_are_a_mismatch() {
        let mut input = header_bytes(0x0065, 0, 0);
        input.push(0xFF);
        assert!(matches!(
            EncapsPacket::decode(&input),
            Err(EncapsError::LengthMismatch { available: 1, .. })
        ));
    }

    #[test]
    fn test_encode_recomputes_length() {
        let mut packet = EncapsPacket::reply(EncapsCommand::LIST_IDENTITY, 7, EncapsStatus::SUCCESS);
        packet.header.length = 999;
        packet.data = Bytes::from_static(&[1, 2, 3]);

        let bytes = packet.encode().unwrap();
        assert_eq!(bytes.len(), ENCAPS_HEADER_LEN + 3);
        assert_eq!(&bytes[2..4], &[3, 0]);
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let mut packet = EncapsPacket::reply(EncapsCommand::NOP, 0, EncapsStatus::SUCCESS);
        packet.data = Bytes::from(vec![0u8; 70_000]);
        assert_eq!(packet.encode(), Err(EncodeError::PayloadTooLarge(70_000)));
    }

    #[test]
    fn test_header_roundtrip_preserves_command_and_session() {
        let packet = EncapsPacket::reply(
            EncapsCommand::SEND_UNIT_DATA,
            0x0102_0304,
            EncapsStatus::SUCCESS,
        );
        let decoded = EncapsPacket::decode(&packet.encode().unwrap()).unwrap();
        assert_eq!(decoded.header.command, EncapsCommand::SEND_UNIT_DATA);
        assert_eq!(decoded.header.session_handle, 0x0102_0304);
    }

    #[test]
    fn test_salvage_from_tiny_buffers() {
        assert_eq!(salvage_header(&[]), SalvagedHeader::default());
        assert_eq!(salvage_header(&[0x65]).command, EncapsCommand(0));

        let four = salvage_header(&[0x65, 0x00, 0x10, 0x00]);
        assert_eq!(four.command, EncapsCommand::REGISTER_SESSION);
        assert_eq!(four.session_handle, 0);

        let eight = salvage_header(&[0x6F, 0x00, 0x00, 0x00, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(eight.command, EncapsCommand::SEND_RR_DATA);
        assert_eq!(eight.session_handle, 0x1234_5678);
    }

    #[test]
    fn test_decode_request_skips_nested_for_plain_commands() {
        let input = header_bytes(0x0063, 0, 0);
        match decode_request(&input) {
            EncapsDecode::Parsed { packet, nested } => {
                assert_eq!(packet.header.command, EncapsCommand::LIST_IDENTITY);
                assert!(nested.is_none());
            }
            other => panic!("expected parsed, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_failure_keeps_outer_header() {
        // SendRRData with two bytes of data: too short for interface handle
        let mut input = header_bytes(0x006F, 2, 0x55);
        input.extend_from_slice(&[0x00, 0x00]);

        match decode_request(&input) {
            EncapsDecode::Parsed { packet, nested } => {
                assert_eq!(packet.header.session_handle, 0x55);
                assert!(matches!(nested, Some(Err(_))));
            }
            other => panic!("expected parsed, got {:?}", other),
        }
    }

    #[test]
    fn test_command_display() {
        assert_eq!(
            EncapsCommand::REGISTER_SESSION.to_string(),
            "RegisterSession(0x0065)"
        );
        assert_eq!(EncapsCommand(0xBEEF).to_string(), "Unknown(0xbeef)");
        assert_eq!(
            EncapsStatus::INVALID_FORMAT_OR_DATA.to_string(),
            "InvalidFormatOrData(0x0003)"
        );
    }
}
