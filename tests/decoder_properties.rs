//! Property-based tests for the request decoders.
//!
//! Whatever bytes arrive, decoding must not panic, an EtherNet/IP request
//! must still produce a well-formed 24-byte reply, and an SLMP buffer must
//! be consumed or rejected without leaving the service stuck.

use bytes::BytesMut;
use ics_harness::dispatch::{DispatchEntry, DEFAULT_TABLE};
use ics_harness::harness::{FrameService, HarnessStats, SlmpService};
use ics_harness::protocol::enip::{
    decode_request, EncapsCommand, EncapsDecode, EncapsError, EncapsHeader, EncapsStatus,
};
use ics_harness::protocol::slmp::{parse_frame, ResponseFrame};
use ics_harness::synth::encaps_response_bytes;
use proptest::prelude::*;

/// Encapsulation headers with arbitrary field values.
fn header_strategy() -> impl Strategy<Value = EncapsHeader> {
    (
        any::<u16>(),
        any::<u16>(),
        any::<u32>(),
        any::<u32>(),
        any::<[u8; 8]>(),
        any::<u32>(),
    )
        .prop_map(|(command, length, session_handle, status, sender_context, options)| {
            EncapsHeader {
                command: EncapsCommand(command),
                length,
                session_handle,
                status: EncapsStatus(status),
                sender_context,
                options,
            }
        })
}

/// Loopback request in binary framing with the given payload.
fn binary_loopback(payload: &[u8]) -> Vec<u8> {
    let data_len = (8 + payload.len()) as u16;
    let mut frame = vec![0x50, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00];
    frame.extend_from_slice(&data_len.to_le_bytes());
    frame.extend_from_slice(&[0x10, 0x00, 0x19, 0x06, 0x00, 0x00]);
    frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

proptest! {
    /// Any input yields exactly one 24-byte reply whose status reflects the
    /// decode outcome.
    #[test]
    fn encaps_reply_is_total(input in prop::collection::vec(any::<u8>(), 0..256)) {
        let decoded = decode_request(&input);
        let reply = encaps_response_bytes(&decoded);

        prop_assert_eq!(reply.len(), 24);
        let header = EncapsHeader::decode(&reply).unwrap();
        if decoded.is_parsed() {
            prop_assert_eq!(header.status, EncapsStatus::SUCCESS);
        } else {
            prop_assert_eq!(header.status, EncapsStatus::INVALID_FORMAT_OR_DATA);
        }
    }

    /// Buffers shorter than a header always fail as short headers.
    #[test]
    fn short_buffers_fail(input in prop::collection::vec(any::<u8>(), 0..24)) {
        match decode_request(&input) {
            EncapsDecode::Failed { error, .. } => {
                prop_assert_eq!(error, EncapsError::ShortHeader(input.len()));
            }
            EncapsDecode::Parsed { .. } => prop_assert!(false, "short buffer decoded"),
        }
    }

    /// A declared length beyond the bytes present is reported with the
    /// decoded header and answered with INVALID_FORMAT_OR_DATA.
    #[test]
    fn length_overrun_is_diagnosed(
        header in header_strategy(),
        present in 0usize..64,
        extra in 1u16..512,
    ) {
        let length = (present as u16).saturating_add(extra);
        let header = EncapsHeader { length, ..header };

        let mut input = BytesMut::new();
        header.encode_into(&mut input);
        input.extend_from_slice(&vec![0xAB; present]);

        let decoded = decode_request(&input);
        match &decoded {
            EncapsDecode::Failed { error: EncapsError::LengthMismatch { header: reported, available }, salvage } => {
                prop_assert_eq!(*reported, header);
                prop_assert_eq!(*available, present);
                prop_assert_eq!(salvage.command, header.command);
                prop_assert_eq!(salvage.session_handle, header.session_handle);
            }
            other => prop_assert!(false, "unexpected decode: {:?}", other),
        }

        let reply = EncapsHeader::decode(&encaps_response_bytes(&decoded)).unwrap();
        prop_assert_eq!(reply.status, EncapsStatus::INVALID_FORMAT_OR_DATA);
        prop_assert_eq!(reply.command, header.command);
        prop_assert_eq!(reply.session_handle, header.session_handle);
    }

    /// Encoding a header then decoding it gives the same header back.
    #[test]
    fn header_round_trip(header in header_strategy()) {
        let mut buf = BytesMut::new();
        header.encode_into(&mut buf);
        prop_assert_eq!(buf.len(), 24);
        prop_assert_eq!(EncapsHeader::decode(&buf).unwrap(), header);
    }

    /// The SLMP frame parser never panics and never claims more bytes than
    /// it was given.
    #[test]
    fn slmp_parse_is_bounded(input in prop::collection::vec(any::<u8>(), 0..256)) {
        if let Ok(Some((_, consumed))) = parse_frame(&input) {
            prop_assert!(consumed <= input.len());
        }
    }

    /// ASCII-looking garbage exercises the hex paths.
    #[test]
    fn slmp_ascii_garbage(input in "[0-9A-Fa-fD5G]{0,80}") {
        let _ = parse_frame(input.as_bytes());
        let _ = ResponseFrame::decode(input.as_bytes());
    }

    /// Loopback data comes back unchanged however the stream is split.
    #[test]
    fn loopback_echo_any_split(
        payload in prop::collection::vec(any::<u8>(), 1..200),
        split in any::<prop::sample::Index>(),
    ) {
        let frame = binary_loopback(&payload);
        let at = split.index(frame.len());

        let stats = HarnessStats::new();
        let mut service = SlmpService::new(&DEFAULT_TABLE);
        let mut replies = service.on_receive(&frame[..at], &stats);
        replies.extend(service.on_receive(&frame[at..], &stats));

        prop_assert_eq!(replies.len(), 1);
        let response = ResponseFrame::decode(&replies[0]).unwrap();
        prop_assert_eq!(&response.data[2..], &payload[..]);
        prop_assert_eq!(service.pending(), 0);
    }

    /// Lookup of any key returns the same entry every time.
    #[test]
    fn lookup_is_idempotent(command in any::<u16>(), sub_command in any::<u16>()) {
        let first = DEFAULT_TABLE.lookup(command, sub_command).map(|e| e as *const DispatchEntry);
        let second = DEFAULT_TABLE.lookup(command, sub_command).map(|e| e as *const DispatchEntry);
        prop_assert_eq!(first, second);
    }
}
