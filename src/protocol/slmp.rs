//! SLMP Frame Codec
//!
//! SLMP (SeamLess Message Protocol) frames come in two transmission
//! categories and two stream encodings:
//!
//! - **ST** (single transmission, "3E") and **MT** (multiple transmission,
//!   "4E", which adds a serial number)
//! - **Binary** (little-endian integers) and **ASCII** (the same fields as
//!   fixed-width hex text, most significant digit first)
//!
//! ## Request Layout
//!
//! ```text
//! field              binary        ASCII
//! ─────────────────  ────────────  ─────────
//! subheader          50 00 / 54 00 "5000" / "5400"
//! serial   (MT only) u16           4 chars
//! reserved (MT only) u16           4 chars
//! network number     u8            2 chars
//! node number        u8            2 chars
//! dst process number u16           4 chars
//! dst multidrop      u8            2 chars
//! data length        u16           4 chars
//! ── counted by data length ──────────────────
//! monitoring timer   u16           4 chars
//! command            u16           4 chars
//! sub-command        u16           4 chars
//! request data       ...           ...
//! ```
//!
//! Responses use subheaders `D0 00` / `D4 00` and replace the timer, command
//! and sub-command with a 16-bit end code.
//!
//! ## Parsing Model
//!
//! [`parse_frame`] works over a connection buffer the same way a stream
//! parser does:
//!
//! - `Ok(Some((frame, consumed)))` - a complete frame was decoded
//! - `Ok(None)` - the frame is incomplete, read more bytes
//! - `Err(SlmpError)` - the bytes can never become a valid request

use crate::protocol::wire::{put_hex, WireError, WireReader};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;

/// Default SLMP server port used by the harness.
pub const DEFAULT_PORT: u16 = 8888;

/// SLMP command codes
pub mod command {
    pub const DEVICE_READ: u16 = 0x0401;
    pub const DEVICE_WRITE: u16 = 0x1401;
    pub const REMOTE_RUN: u16 = 0x1001;
    pub const REMOTE_STOP: u16 = 0x1002;
    pub const READ_TYPE_NAME: u16 = 0x0101;
    pub const LOOPBACK_TEST: u16 = 0x0619;
    pub const CLEAR_ERROR: u16 = 0x1617;

    /// Name of a command code, for logging.
    pub fn name(code: u16) -> &'static str {
        match code {
            DEVICE_READ => "DeviceRead",
            DEVICE_WRITE => "DeviceWrite",
            REMOTE_RUN => "RemoteRun",
            REMOTE_STOP => "RemoteStop",
            READ_TYPE_NAME => "ReadTypeName",
            LOOPBACK_TEST => "LoopbackTest",
            CLEAR_ERROR => "ClearError",
            _ => "Unknown",
        }
    }
}

/// Wire encoding of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    Binary,
    Ascii,
}

impl StreamType {
    /// Detects the encoding from the first byte of a frame.
    pub fn detect(first: u8) -> Option<Self> {
        match first {
            0x50 | 0x54 | 0xD0 | 0xD4 => Some(StreamType::Binary),
            b'5' | b'D' | b'd' => Some(StreamType::Ascii),
            _ => None,
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamType::Binary => write!(f, "binary"),
            StreamType::Ascii => write!(f, "ascii"),
        }
    }
}

/// Transmission category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameCategory {
    /// Single transmission (3E frame)
    Single,
    /// Multiple transmission (4E frame, carries a serial number)
    Multiple,
}

/// Frame type, identified by the subheader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    RequestSt,
    RequestMt,
    ResponseSt,
    ResponseMt,
}

impl FrameType {
    pub fn from_subheader(subheader: u16) -> Option<Self> {
        match subheader {
            0x5000 => Some(FrameType::RequestSt),
            0x5400 => Some(FrameType::RequestMt),
            0xD000 => Some(FrameType::ResponseSt),
            0xD400 => Some(FrameType::ResponseMt),
            _ => None,
        }
    }

    pub fn subheader(self) -> u16 {
        match self {
            FrameType::RequestSt => 0x5000,
            FrameType::RequestMt => 0x5400,
            FrameType::ResponseSt => 0xD000,
            FrameType::ResponseMt => 0xD400,
        }
    }

    pub fn category(self) -> FrameCategory {
        match self {
            FrameType::RequestSt | FrameType::ResponseSt => FrameCategory::Single,
            FrameType::RequestMt | FrameType::ResponseMt => FrameCategory::Multiple,
        }
    }

    pub fn is_request(self) -> bool {
        matches!(self, FrameType::RequestSt | FrameType::RequestMt)
    }

    /// The response type answering a frame of this category.
    pub fn response_for(category: FrameCategory) -> Self {
        match category {
            FrameCategory::Single => FrameType::ResponseSt,
            FrameCategory::Multiple => FrameType::ResponseMt,
        }
    }
}

/// Addressing fields shared by requests and responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubHeader {
    /// Serial number (MT frames only, zero otherwise)
    pub serial: u16,
    pub net_no: u8,
    pub node_no: u8,
    pub dst_proc_no: u16,
    pub dst_multidrop: u8,
    /// Declared length of everything after the length field
    pub data_len: u16,
}

/// A decoded SLMP request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlmpFrame {
    pub stream: StreamType,
    pub frame_type: FrameType,
    pub sub_header: SubHeader,
    pub timer: u16,
    pub command: u16,
    pub sub_command: u16,
    /// Request data in its wire encoding (hex text for ASCII frames)
    pub data: Bytes,
}

impl SlmpFrame {
    pub fn category(&self) -> FrameCategory {
        self.frame_type.category()
    }

    /// Encodes this request, recomputing the data length field.
    ///
    /// Used by clients and tests; the harness itself only answers requests.
    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        let mut body = BytesMut::new();
        put_u16(&mut body, self.stream, self.timer);
        put_u16(&mut body, self.stream, self.command);
        put_u16(&mut body, self.stream, self.sub_command);
        body.put_slice(&self.data);

        encode_frame(self.stream, self.frame_type, &self.sub_header, &body)
    }
}

/// A response frame, built from the request it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub stream: StreamType,
    pub frame_type: FrameType,
    pub sub_header: SubHeader,
    pub end_code: u16,
    /// Response data in its wire encoding
    pub data: Bytes,
}

impl ResponseFrame {
    /// Builds a successful response to `request`.
    ///
    /// Serial, network, node, destination process and multidrop numbers are
    /// copied from the request; the data length is computed on encode.
    pub fn for_request(request: &SlmpFrame, data: Bytes) -> Self {
        Self {
            stream: request.stream,
            frame_type: FrameType::response_for(request.category()),
            sub_header: SubHeader {
                data_len: 0,
                ..request.sub_header
            },
            end_code: 0x0000,
            data,
        }
    }

    pub fn category(&self) -> FrameCategory {
        self.frame_type.category()
    }

    /// Encodes the frame into an exactly-sized buffer.
    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        let mut body = BytesMut::with_capacity(4 + self.data.len());
        put_u16(&mut body, self.stream, self.end_code);
        body.put_slice(&self.data);

        encode_frame(self.stream, self.frame_type, &self.sub_header, &body)
    }

    /// Decodes a complete response frame occupying all of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, SlmpError> {
        let (head, total) = match parse_header(buf)? {
            Some(parsed) if parsed.1 == buf.len() => parsed,
            Some((_, total)) => {
                return Err(SlmpError::LengthMismatch {
                    declared: total,
                    available: buf.len(),
                })
            }
            None => return Err(SlmpError::Incomplete(buf.len())),
        };
        if head.frame_type.is_request() {
            return Err(SlmpError::UnexpectedFrameType(head.frame_type));
        }

        let mut reader = WireReader::new(&buf[head.header_len..total]);
        let end_code = read_u16(&mut reader, head.stream)?;

        Ok(Self {
            stream: head.stream,
            frame_type: head.frame_type,
            sub_header: head.sub_header,
            end_code,
            data: Bytes::copy_from_slice(reader.rest()),
        })
    }
}

/// SLMP decode failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlmpError {
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The first bytes are not a known subheader
    #[error("unknown subheader {0:#06x}")]
    UnknownSubheader(u16),

    /// A response subheader where a request was expected, or vice versa
    #[error("unexpected frame type {0:?}")]
    UnexpectedFrameType(FrameType),

    /// Data length too small to hold the fixed request fields
    #[error("data length {0} is shorter than the fixed request fields")]
    DataLengthTooShort(u16),

    /// The buffer ends before the declared frame does
    #[error("frame incomplete after {0} bytes")]
    Incomplete(usize),

    /// The buffer does not hold exactly one frame
    #[error("declared frame size {declared} disagrees with {available} bytes")]
    LengthMismatch { declared: usize, available: usize },

    /// Loopback byte count outside 1..=960
    #[error("invalid loopback length {0}")]
    InvalidLoopbackLength(u16),

    /// Bytes left over after the command data
    #[error("{0} trailing bytes after command data")]
    TrailingBytes(usize),
}

/// Failures while serializing a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("frame body of {0} bytes does not fit the 16-bit data length field")]
    BodyTooLarge(usize),

    #[error("loopback data of {0} bytes exceeds the 960-byte limit")]
    LoopbackTooLarge(usize),
}

/// Header fields common to all frame types, plus sizes.
#[derive(Debug, Clone, Copy)]
struct ParsedHeader {
    stream: StreamType,
    frame_type: FrameType,
    sub_header: SubHeader,
    header_len: usize,
}

/// Length of the header up to and including the data length field.
fn header_len(stream: StreamType, category: FrameCategory) -> usize {
    match (stream, category) {
        (StreamType::Binary, FrameCategory::Single) => 9,
        (StreamType::Binary, FrameCategory::Multiple) => 13,
        (StreamType::Ascii, FrameCategory::Single) => 18,
        (StreamType::Ascii, FrameCategory::Multiple) => 26,
    }
}

/// Length of timer + command + sub-command.
fn request_fixed_len(stream: StreamType) -> usize {
    match stream {
        StreamType::Binary => 6,
        StreamType::Ascii => 12,
    }
}

fn read_u8(reader: &mut WireReader<'_>, stream: StreamType) -> Result<u8, WireError> {
    match stream {
        StreamType::Binary => reader.u8(),
        StreamType::Ascii => reader.hex_u8(),
    }
}

pub(crate) fn read_u16(reader: &mut WireReader<'_>, stream: StreamType) -> Result<u16, WireError> {
    match stream {
        StreamType::Binary => reader.u16_le(),
        StreamType::Ascii => reader.hex_u16(),
    }
}

fn put_u8(buf: &mut BytesMut, stream: StreamType, value: u8) {
    match stream {
        StreamType::Binary => buf.put_u8(value),
        StreamType::Ascii => put_hex(buf, u32::from(value), 2),
    }
}

pub(crate) fn put_u16(buf: &mut BytesMut, stream: StreamType, value: u16) {
    match stream {
        StreamType::Binary => buf.put_u16_le(value),
        StreamType::Ascii => put_hex(buf, u32::from(value), 4),
    }
}

/// Parses the header and returns it with the total frame size.
///
/// `Ok(None)` means more bytes are needed to know.
fn parse_header(buf: &[u8]) -> Result<Option<(ParsedHeader, usize)>, SlmpError> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    let stream = StreamType::detect(first).ok_or(SlmpError::UnknownSubheader(u16::from(first) << 8))?;

    let subheader_len = match stream {
        StreamType::Binary => 2,
        StreamType::Ascii => 4,
    };
    if buf.len() < subheader_len {
        return Ok(None);
    }

    let mut reader = WireReader::new(buf);
    let subheader = match stream {
        // Written high byte first on the wire: `50 00`
        StreamType::Binary => u16::from_be_bytes(reader.array()?),
        StreamType::Ascii => reader.hex_u16()?,
    };
    let frame_type = FrameType::from_subheader(subheader).ok_or(SlmpError::UnknownSubheader(subheader))?;

    let header_len = header_len(stream, frame_type.category());
    if buf.len() < header_len {
        return Ok(None);
    }

    let mut sub_header = SubHeader::default();
    if frame_type.category() == FrameCategory::Multiple {
        sub_header.serial = read_u16(&mut reader, stream)?;
        let _reserved = read_u16(&mut reader, stream)?;
    }
    sub_header.net_no = read_u8(&mut reader, stream)?;
    sub_header.node_no = read_u8(&mut reader, stream)?;
    sub_header.dst_proc_no = read_u16(&mut reader, stream)?;
    sub_header.dst_multidrop = read_u8(&mut reader, stream)?;
    sub_header.data_len = read_u16(&mut reader, stream)?;

    let total = header_len + usize::from(sub_header.data_len);
    Ok(Some((
        ParsedHeader {
            stream,
            frame_type,
            sub_header,
            header_len,
        },
        total,
    )))
}

/// Attempts to parse one request frame from the front of `buf`.
///
/// # Returns
///
/// - `Ok(Some((frame, consumed)))` - a complete request was decoded
/// - `Ok(None)` - incomplete data, need more bytes
/// - `Err(e)` - the buffer does not start with a valid request
pub fn parse_frame(buf: &[u8]) -> Result<Option<(SlmpFrame, usize)>, SlmpError> {
    let (head, total) = match parse_header(buf)? {
        Some(parsed) => parsed,
        None => return Ok(None),
    };

    if !head.frame_type.is_request() {
        return Err(SlmpError::UnexpectedFrameType(head.frame_type));
    }
    if usize::from(head.sub_header.data_len) < request_fixed_len(head.stream) {
        return Err(SlmpError::DataLengthTooShort(head.sub_header.data_len));
    }
    if buf.len() < total {
        return Ok(None);
    }

    let mut reader = WireReader::new(&buf[head.header_len..total]);
    let timer = read_u16(&mut reader, head.stream)?;
    let command = read_u16(&mut reader, head.stream)?;
    let sub_command = read_u16(&mut reader, head.stream)?;

    let frame = SlmpFrame {
        stream: head.stream,
        frame_type: head.frame_type,
        sub_header: head.sub_header,
        timer,
        command,
        sub_command,
        data: Bytes::copy_from_slice(reader.rest()),
    };
    Ok(Some((frame, total)))
}

fn encode_frame(
    stream: StreamType,
    frame_type: FrameType,
    sub_header: &SubHeader,
    body: &[u8],
) -> Result<Bytes, EncodeError> {
    let data_len = u16::try_from(body.len()).map_err(|_| EncodeError::BodyTooLarge(body.len()))?;

    let mut buf = BytesMut::with_capacity(header_len(stream, frame_type.category()) + body.len());
    match stream {
        StreamType::Binary => buf.put_u16(frame_type.subheader()),
        StreamType::Ascii => put_hex(&mut buf, u32::from(frame_type.subheader()), 4),
    }
    if frame_type.category() == FrameCategory::Multiple {
        put_u16(&mut buf, stream, sub_header.serial);
        put_u16(&mut buf, stream, 0x0000);
    }
    put_u8(&mut buf, stream, sub_header.net_no);
    put_u8(&mut buf, stream, sub_header.node_no);
    put_u16(&mut buf, stream, sub_header.dst_proc_no);
    put_u8(&mut buf, stream, sub_header.dst_multidrop);
    put_u16(&mut buf, stream, data_len);
    buf.put_slice(body);

    Ok(buf.freeze())
}
