//! Response Synthesizer
//!
//! Builds the bytes sent back for each request.
//!
//! The encapsulation reply is a total function of the decode outcome: a
//! decoded request is answered with SUCCESS, a rejected one with
//! INVALID_FORMAT_OR_DATA using whatever command and session handle could be
//! salvaged. Neither carries command data. If serialization itself fails the
//! peer still gets 24 zero bytes, so every encapsulation request is answered.
//!
//! SLMP responses are built by dispatch handlers; this module only turns them
//! into bytes.

use crate::protocol::enip::{EncapsDecode, EncapsPacket, EncapsStatus, ENCAPS_HEADER_LEN};
use crate::protocol::slmp::ResponseFrame;
use bytes::Bytes;
use tracing::warn;

/// Fallback reply when an encapsulation reply cannot be serialized.
pub const MINIMAL_RESPONSE: [u8; ENCAPS_HEADER_LEN] = [0u8; ENCAPS_HEADER_LEN];

/// Chooses the encapsulation reply for a decode outcome.
pub fn encaps_reply(decoded: &EncapsDecode) -> EncapsPacket {
    match decoded {
        EncapsDecode::Parsed { packet, .. } => EncapsPacket::reply(
            packet.header.command,
            packet.header.session_handle,
            EncapsStatus::SUCCESS,
        ),
        EncapsDecode::Failed { salvage, .. } => EncapsPacket::reply(
            salvage.command,
            salvage.session_handle,
            EncapsStatus::INVALID_FORMAT_OR_DATA,
        ),
    }
}

/// Serializes `reply`, substituting [`MINIMAL_RESPONSE`] on failure.
pub fn serialize_or_minimal(reply: &EncapsPacket) -> Bytes {
    match reply.encode() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Reply serialization failed, sending minimal response");
            Bytes::from_static(&MINIMAL_RESPONSE)
        }
    }
}

/// Decode outcome straight to reply bytes.
pub fn encaps_response_bytes(decoded: &EncapsDecode) -> Bytes {
    serialize_or_minimal(&encaps_reply(decoded))
}

/// Serializes an SLMP response, or `None` if it cannot be encoded.
///
/// The frame is dropped in that case; SLMP has no fallback reply.
pub fn slmp_response_bytes(response: &ResponseFrame) -> Option<Bytes> {
    match response.encode() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(error = %e, "SLMP response could not be encoded, dropping");
            None
        }
    }
}
