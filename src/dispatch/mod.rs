//! Command Dispatch Module
//!
//! Routes decoded SLMP request frames to their handlers.
//!
//! ## Architecture
//!
//! ```text
//! SlmpFrame
//!     │
//!     ▼
//! ┌─────────────────┐
//! │ DispatchTable   │  lookup (command, sub-command)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ decode fn       │  raw data → SlmpCommand
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ handler fn      │  TransactionContext → Continue | Skip
//! └────────┬────────┘
//!          │
//!          ▼
//!   Reply(ResponseFrame) | Skipped | Unmatched
//! ```
//!
//! Unlike the EtherNet/IP path, which always answers, this path only replies
//! when a handler exists and decides to produce a response.

pub mod context;
pub mod loopback;
pub mod table;

pub use context::{HandlerHint, SlmpCommand, TransactionContext};
pub use table::{
    dispatch_frame, AddressWidth, DispatchEntry, DispatchTable, Dispatched, DEFAULT_TABLE,
};
