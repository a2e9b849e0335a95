//! Command Dispatch Table
//!
//! A static, ordered list of entries keyed by (command, sub-command). Lookup
//! is a linear scan and the first exact match wins; keys are expected to be
//! unique, which is a property of how a table is written rather than
//! something checked at runtime.
//!
//! ```text
//! (command, sub-command)
//!        │
//!        ▼
//! ┌──────────────────────────────────────────────┐
//! │ 0x0619/0x0000 │ decode_self_test │ loopback   │
//! │ ...           │ ...              │ ...        │
//! └──────────────────────────────────────────────┘
//!        │ found                         │ not found
//!        ▼                               ▼
//!   decode → handler              frame dropped, no reply
//! ```

use crate::dispatch::context::{HandlerHint, SlmpCommand, TransactionContext};
use crate::dispatch::loopback;
use crate::protocol::slmp::{command, ResponseFrame, SlmpError, SlmpFrame, StreamType};
use tracing::{debug, trace};

/// Device address width a command's decoder should assume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressWidth {
    /// The command carries no device addresses
    DontCare,
    /// 3-byte device numbers (sub-command 0x0000 / 0x0001)
    Short,
    /// 4-byte device numbers (sub-command 0x0002 / 0x0003)
    Long,
}

/// Turns raw request data into a command object.
pub type DecodeFn = fn(&[u8], StreamType, AddressWidth) -> Result<SlmpCommand, SlmpError>;

/// Handles one transaction, optionally producing a response.
///
/// The hint must agree with the response slot: `Continue` after
/// [`TransactionContext::set_response`], `Skip` otherwise. Only the slot
/// decides what is sent; debug builds assert the two match.
pub type HandlerFn = fn(&mut TransactionContext<'_>) -> HandlerHint;

/// One immutable row of a dispatch table.
#[derive(Clone, Copy)]
pub struct DispatchEntry {
    pub command: u16,
    pub sub_command: u16,
    pub addr_width: AddressWidth,
    pub decode: Option<DecodeFn>,
    pub handler: HandlerFn,
    pub name: &'static str,
}

impl std::fmt::Debug for DispatchEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEntry")
            .field("command", &format_args!("{:#06x}", self.command))
            .field("sub_command", &format_args!("{:#06x}", self.sub_command))
            .field("addr_width", &self.addr_width)
            .field("decodes", &self.decode.is_some())
            .field("name", &self.name)
            .finish()
    }
}

impl DispatchEntry {
    pub fn matches(&self, command: u16, sub_command: u16) -> bool {
        self.command == command && self.sub_command == sub_command
    }
}

/// A read-only dispatch table, usually a `static`.
#[derive(Debug, Clone, Copy)]
pub struct DispatchTable {
    entries: &'static [DispatchEntry],
}

/// The table served by the SLMP harness.
pub static DEFAULT_TABLE: DispatchTable = DispatchTable::new(&[DispatchEntry {
    command: command::LOOPBACK_TEST,
    sub_command: 0x0000,
    addr_width: AddressWidth::DontCare,
    decode: Some(loopback::decode),
    handler: loopback::handle,
    name: "LoopbackTest",
}]);

impl DispatchTable {
    pub const fn new(entries: &'static [DispatchEntry]) -> Self {
        Self { entries }
    }

    /// Finds the first entry for (command, sub-command).
    pub fn lookup(&self, command: u16, sub_command: u16) -> Option<&'static DispatchEntry> {
        self.entries
            .iter()
            .find(|entry| entry.matches(command, sub_command))
    }

    pub fn entries(&self) -> &'static [DispatchEntry] {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of routing one request frame through a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// The handler produced a response
    Reply(ResponseFrame),
    /// An entry matched but the handler chose not to answer
    Skipped,
    /// No entry for this (command, sub-command); the frame is dropped
    Unmatched,
}

/// Looks up, decodes and handles one request frame.
pub fn dispatch_frame(table: &DispatchTable, frame: &SlmpFrame) -> Dispatched {
    let Some(entry) = table.lookup(frame.command, frame.sub_command) else {
        debug!(
            command = format_args!("{:#06x}", frame.command),
            sub_command = format_args!("{:#06x}", frame.sub_command),
            "No dispatch entry, dropping frame"
        );
        return Dispatched::Unmatched;
    };

    let command = entry.decode.and_then(|decode| {
        match decode(&frame.data, frame.stream, entry.addr_width) {
            Ok(command) => Some(command),
            Err(e) => {
                debug!(entry = entry.name, error = %e, "Command decode failed");
                None
            }
        }
    });

    let mut ctx = TransactionContext::new(frame, command.as_ref());
    let hint = (entry.handler)(&mut ctx);
    trace!(entry = entry.name, ?hint, "Handler returned");
    debug_assert_eq!(
        hint == HandlerHint::Continue,
        ctx.response().is_some(),
        "handler {} returned {:?} disagreeing with its response slot",
        entry.name,
        hint
    );

    match ctx.into_response() {
        Some(response) => Dispatched::Reply(response),
        None => Dispatched::Skipped,
    }
}
