//! Fuzz target for single SLMP frame decoding
//!
//! # Invariants
//!
//! - parse_frame never panics and never consumes more than it was given
//! - A decoded request can be dispatched and its response encoded

#![no_main]

use ics_harness::dispatch::{dispatch_frame, Dispatched, DEFAULT_TABLE};
use ics_harness::protocol::slmp::{parse_frame, ResponseFrame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = ResponseFrame::decode(data);

    if let Ok(Some((frame, consumed))) = parse_frame(data) {
        assert!(consumed <= data.len());
        if let Dispatched::Reply(response) = dispatch_frame(&DEFAULT_TABLE, &frame) {
            let _ = response.encode();
        }
    }
});
