//! Shared entry point for the harness binaries.

use crate::config::{parse_args, usage, CliAction, HarnessConfig, Protocol};
use crate::harness::{FrameService, Harness};
use crate::shutdown;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Installs the stderr log subscriber. `RUST_LOG` overrides the `info`
/// default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Parses the process arguments, binds, and runs `service` to completion.
pub async fn launch<S: FrameService>(protocol: Protocol, service: S) -> ExitCode {
    let config = match parse_args(protocol, std::env::args().skip(1)) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            println!("{}", usage(protocol));
            return ExitCode::SUCCESS;
        }
        Ok(CliAction::Version) => {
            println!("{} version {}", protocol.binary_name(), crate::VERSION);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", usage(protocol));
            return ExitCode::FAILURE;
        }
    };

    init_tracing();

    match run(config, service).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Harness setup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run<S: FrameService>(config: HarnessConfig, service: S) -> anyhow::Result<()> {
    if let Some(rejected) = &config.rejected_port {
        warn!(value = %rejected, port = config.port, "Invalid port, using default");
    }

    let (trigger, shutdown) = shutdown::channel();
    let signals = shutdown::install_signal_handlers(trigger)?;

    let mut harness = Harness::bind(&config, service, shutdown)?;
    info!(
        protocol = config.protocol.name(),
        version = crate::VERSION,
        accept_timeout = ?config.timeouts.accept,
        recv_timeout = ?config.timeouts.recv,
        "Harness started"
    );

    harness.run().await;
    signals.abort();

    info!("Harness shutdown complete");
    Ok(())
}
