//! Fuzz target for SLMP stream reassembly
//!
//! Feeds the service a sequence of receive buffers, the way a connection
//! would deliver them.
//!
//! # Invariants
//!
//! - The pending buffer never grows without bound
//! - Idle and reset events always clear partial data

#![no_main]

use arbitrary::Arbitrary;
use ics_harness::harness::{FrameService, HarnessStats, SlmpService};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Event {
    Receive(Vec<u8>),
    Idle,
    Reset,
}

fuzz_target!(|events: Vec<Event>| {
    let stats = HarnessStats::new();
    let mut service = SlmpService::default();

    for event in events {
        match event {
            Event::Receive(bytes) => {
                let _ = service.on_receive(&bytes, &stats);
                assert!(service.pending() <= 256 * 1024);
            }
            Event::Idle => {
                service.on_idle();
                assert_eq!(service.pending(), 0);
            }
            Event::Reset => {
                service.on_connection_reset();
                assert_eq!(service.pending(), 0);
            }
        }
    }
});
