//! Harness Orchestrator Module
//!
//! Drives the accept → receive → decode/dispatch → respond loop for one
//! protocol service at a time.
//!
//! ## Lifecycles
//!
//! ```text
//! single-shot:  LISTENING ─> ACCEPTED ─> SERVING ─> TERMINATED
//!
//! persistent:   LISTENING ─> ACCEPTED ─> SERVING ─┐
//!                   ▲                             │
//!                   └─────────────────────────────┘
//!                   (until the shutdown flag is raised)
//! ```
//!
//! ## Reply policies
//!
//! The two protocols answer differently and the difference is kept explicit:
//! an EtherNet/IP request is always answered, an SLMP request only when a
//! dispatch handler produced a response.

pub mod orchestrator;
pub mod service;
pub mod stats;

pub use crate::config::{Lifecycle, Timeouts};
pub use orchestrator::{serve_connection, Harness, HarnessState, ServeEnd};
pub use service::{EncapsService, SlmpService};
pub use stats::{HarnessStats, RunReport};

use bytes::Bytes;

/// Whether every request is guaranteed a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyPolicy {
    /// Exactly one reply per request, falling back to a minimal frame
    AlwaysReply,
    /// Zero or one reply per request, as the handler decides
    HandlerDecides,
}

/// Protocol-specific request handling.
pub trait FrameService {
    fn name(&self) -> &'static str;

    fn reply_policy(&self) -> ReplyPolicy;

    /// Handles one received buffer and returns the replies to send, in order.
    fn on_receive(&mut self, frame: &[u8], stats: &HarnessStats) -> Vec<Bytes>;

    /// Logs anything worth knowing before the first connection.
    fn log_startup(&self) {}

    /// Called when a connection ends, before the next one is accepted.
    fn on_connection_reset(&mut self) {}

    /// Called after a receive timeout on a connection that stays open.
    fn on_idle(&mut self) {}
}
