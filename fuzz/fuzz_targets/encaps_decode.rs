//! Fuzz target for the EtherNet/IP request path
//!
//! # Invariants
//!
//! - Decoding never panics, whatever the bytes
//! - Every input gets exactly one 24-byte reply
//! - A rejected request is answered with INVALID_FORMAT_OR_DATA

#![no_main]

use ics_harness::protocol::enip::{decode_request, EncapsHeader, EncapsStatus};
use ics_harness::synth::encaps_response_bytes;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let decoded = decode_request(data);
    let reply = encaps_response_bytes(&decoded);

    assert_eq!(reply.len(), 24);
    let header = EncapsHeader::decode(&reply).expect("reply must decode");
    if !decoded.is_parsed() {
        assert_eq!(header.status, EncapsStatus::INVALID_FORMAT_OR_DATA);
    }
});
