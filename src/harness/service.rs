//! Per-protocol request handling plugged into the orchestrator.

use crate::dispatch::{dispatch_frame, DispatchTable, Dispatched, DEFAULT_TABLE};
use crate::harness::stats::HarnessStats;
use crate::harness::{FrameService, ReplyPolicy};
use crate::protocol::cip::SendData;
use crate::protocol::enip::{decode_request, EncapsDecode};
use crate::protocol::slmp::parse_frame;
use crate::synth;
use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, info, trace, warn};

/// Upper bound on buffered, not yet complete SLMP data.
const MAX_PENDING: usize = 128 * 1024;

/// EtherNet/IP: every received buffer is one request and gets one reply.
#[derive(Debug, Default)]
pub struct EncapsService;

impl EncapsService {
    pub fn new() -> Self {
        Self
    }
}

impl FrameService for EncapsService {
    fn name(&self) -> &'static str {
        "EtherNet/IP"
    }

    fn reply_policy(&self) -> ReplyPolicy {
        ReplyPolicy::AlwaysReply
    }

    fn on_receive(&mut self, frame: &[u8], stats: &HarnessStats) -> Vec<Bytes> {
        let decoded = decode_request(frame);

        match &decoded {
            EncapsDecode::Parsed { packet, nested } => {
                debug!(
                    command = %packet.header.command,
                    session = format_args!("{:#010x}", packet.header.session_handle),
                    length = packet.header.length,
                    "Encapsulation request"
                );
                match nested {
                    Some(Ok(send)) => log_send_data(send),
                    Some(Err(e)) => debug!(error = %e, "Common packet decode failed"),
                    None => {}
                }
            }
            EncapsDecode::Failed { error, salvage } => {
                stats.decode_failure();
                debug!(
                    error = %error,
                    command = %salvage.command,
                    session = format_args!("{:#010x}", salvage.session_handle),
                    "Encapsulation decode failed"
                );
            }
        }

        vec![synth::encaps_response_bytes(&decoded)]
    }
}

fn log_send_data(send: &SendData) {
    trace!(
        interface = send.interface_handle,
        timeout = send.timeout,
        items = send.packet.items.len(),
        "Common packet"
    );
    for item in &send.packet.items {
        match item.message_request() {
            Some(Ok(request)) => debug!(
                service = request.service_name(),
                path_len = request.path.len(),
                data_len = request.data.len(),
                "Message router request"
            ),
            Some(Err(e)) => debug!(item = format_args!("{:#06x}", item.type_id), error = %e, "Message router decode failed"),
            None => trace!(item = format_args!("{:#06x}", item.type_id), len = item.data.len(), "Item"),
        }
    }
}

/// SLMP: frames are reassembled from the stream and routed through a
/// dispatch table; only handled commands are answered.
#[derive(Debug)]
pub struct SlmpService {
    table: &'static DispatchTable,
    pending: BytesMut,
}

impl SlmpService {
    pub fn new(table: &'static DispatchTable) -> Self {
        Self {
            table,
            pending: BytesMut::new(),
        }
    }

    /// Bytes buffered toward an incomplete frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Default for SlmpService {
    fn default() -> Self {
        Self::new(&DEFAULT_TABLE)
    }
}

impl FrameService for SlmpService {
    fn name(&self) -> &'static str {
        "SLMP"
    }

    fn reply_policy(&self) -> ReplyPolicy {
        ReplyPolicy::HandlerDecides
    }

    fn on_receive(&mut self, frame: &[u8], stats: &HarnessStats) -> Vec<Bytes> {
        self.pending.extend_from_slice(frame);
        let mut replies = Vec::new();

        loop {
            match parse_frame(&self.pending) {
                Ok(Some((request, consumed))) => {
                    self.pending.advance(consumed);
                    trace!(
                        consumed,
                        remaining = self.pending.len(),
                        stream = %request.stream,
                        "Parsed frame"
                    );

                    match dispatch_frame(self.table, &request) {
                        Dispatched::Reply(response) => {
                            match synth::slmp_response_bytes(&response) {
                                Some(bytes) => replies.push(bytes),
                                None => stats.frame_dropped(),
                            }
                        }
                        Dispatched::Skipped | Dispatched::Unmatched => stats.frame_dropped(),
                    }
                }
                Ok(None) => {
                    if self.pending.len() > MAX_PENDING {
                        warn!(size = self.pending.len(), "Pending buffer limit exceeded, discarding");
                        stats.decode_failure();
                        self.pending.clear();
                    }
                    break;
                }
                Err(e) => {
                    debug!(error = %e, discarded = self.pending.len(), "Frame decode failed");
                    stats.decode_failure();
                    self.pending.clear();
                    break;
                }
            }
        }

        replies
    }

    fn log_startup(&self) {
        for entry in self.table.entries() {
            info!(
                command = format_args!("{:#06x}", entry.command),
                sub_command = format_args!("{:#06x}", entry.sub_command),
                width = ?entry.addr_width,
                handler = entry.name,
                "Dispatch entry"
            );
        }
    }

    fn on_connection_reset(&mut self) {
        self.pending.clear();
    }

    fn on_idle(&mut self) {
        if !self.pending.is_empty() {
            debug!(discarded = self.pending.len(), "Discarding stale partial frame");
            self.pending.clear();
        }
    }
}
