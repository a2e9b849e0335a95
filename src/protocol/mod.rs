//! Protocol Decoders and Encoders
//!
//! This module holds the wire codecs the harnesses exercise. Every decoder
//! takes an untrusted byte slice and returns a typed error instead of
//! panicking, no matter what the bytes contain.
//!
//! ## Modules
//!
//! - `wire`: bounds-checked readers shared by all codecs
//! - `enip`: EtherNet/IP encapsulation header, decode layers, salvage path
//! - `cip`: common packet format and CIP Message Router requests
//! - `slmp`: SLMP request/response frames (ASCII and binary, ST and MT)
//! - `selftest`: SLMP loopback test command
//!
//! ## Example
//!
//! ```
//! use ics_harness::protocol::enip::{decode_request, EncapsCommand, EncapsDecode};
//!
//! let mut frame = vec![0u8; 24];
//! frame[0] = 0x65; // RegisterSession
//!
//! match decode_request(&frame) {
//!     EncapsDecode::Parsed { packet, .. } => {
//!         assert_eq!(packet.header.command, EncapsCommand::REGISTER_SESSION);
//!     }
//!     EncapsDecode::Failed { .. } => unreachable!(),
//! }
//! ```

pub mod cip;
pub mod enip;
pub mod selftest;
pub mod slmp;
pub mod wire;

pub use enip::{decode_request, salvage_header, EncapsDecode, EncapsError, EncapsPacket};
pub use slmp::{parse_frame, ResponseFrame, SlmpError, SlmpFrame, StreamType};
pub use wire::WireError;
