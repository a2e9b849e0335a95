//! SLMP harness.
//!
//! Reassembles ASCII or binary request frames and routes them through the
//! default dispatch table. Commands without a handler are not answered.

use ics_harness::config::Protocol;
use ics_harness::dispatch::DEFAULT_TABLE;
use ics_harness::harness::SlmpService;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    ics_harness::launch(Protocol::Slmp, SlmpService::new(&DEFAULT_TABLE)).await
}
