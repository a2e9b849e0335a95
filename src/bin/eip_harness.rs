//! EtherNet/IP encapsulation harness.
//!
//! Answers every request on the connection with an encapsulation reply:
//! SUCCESS when the header decodes, INVALID_FORMAT_OR_DATA otherwise.

use ics_harness::config::Protocol;
use ics_harness::harness::EncapsService;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    ics_harness::launch(Protocol::EtherNetIp, EncapsService::new()).await
}
