//! # ics-harness - Network Fuzzing Harnesses for Industrial Protocols
//!
//! Small TCP servers that feed raw byte streams into EtherNet/IP and SLMP
//! decoders so an external fuzzer can drive them through realistic
//! connection lifecycles.
//!
//! ## Features
//!
//! - **EtherNet/IP**: encapsulation header, common packet format and CIP
//!   Message Router decoding; every request is answered
//! - **SLMP**: ASCII and binary frames, single and multiple transmission,
//!   table-driven dispatch with a loopback test handler
//! - **Lifecycles**: single-shot (one connection, then exit) or persistent
//! - **Never panics on input**: all decoders return typed errors
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           Harness                                   │
//! │                                                                     │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────────────┐ │
//! │  │ Frame       │───>│ FrameService│───>│ EncapsService            │ │
//! │  │ Transport   │    │ (per proto) │    │  decode → synth reply    │ │
//! │  │ (listener,  │    └─────────────┘    ├──────────────────────────┤ │
//! │  │  connection)│<────── replies ───────│ SlmpService              │ │
//! │  └─────────────┘                       │  parse → dispatch table  │ │
//! │         ▲                              │        → handler         │ │
//! │         │                              └──────────────────────────┘ │
//! │  ┌──────┴──────┐                                                    │
//! │  │  Shutdown   │  SIGINT / SIGTERM, checked between bounded waits   │
//! │  └─────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use ics_harness::config::{CliAction, parse_args, Protocol};
//! use ics_harness::harness::{Harness, SlmpService};
//! use ics_harness::shutdown::Shutdown;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let CliAction::Run(config) = parse_args(Protocol::Slmp, ["--persistent".to_string()])? else {
//!         return Ok(());
//!     };
//!
//!     let mut harness = Harness::bind(&config, SlmpService::default(), Shutdown::never())?;
//!     let report = harness.run().await;
//!     println!("served {} connections", report.connections_accepted);
//!     Ok(())
//! }
//! ```
//!
//! ## Binaries
//!
//! - `eip-harness [PORT]` (default 127.0.0.1:44818)
//! - `slmp-harness [PORT]` (default 0.0.0.0:8888)

pub mod config;
pub mod dispatch;
pub mod harness;
pub mod launcher;
pub mod protocol;
pub mod shutdown;
pub mod synth;
pub mod transport;

pub use config::{HarnessConfig, Lifecycle, Protocol};
pub use harness::{EncapsService, FrameService, Harness, ReplyPolicy, SlmpService};
pub use launcher::launch;
pub use transport::{Connection, FrameListener};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
