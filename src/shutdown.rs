//! Graceful shutdown flag.
//!
//! A `watch` channel carrying `true` once shutdown has been requested. The
//! orchestrator polls it between bounded waits instead of being cancelled
//! mid-transaction, so a request that is being served always finishes.

use std::io;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Read side, checked by the orchestrator.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Write side, held by whoever decides to stop.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl Shutdown {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// A flag that is never raised.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Receivers keep the last value after the sender is gone
        drop(tx);
        Self { rx }
    }
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Spawns a task that raises the flag on SIGINT or SIGTERM.
pub fn install_signal_handlers(trigger: ShutdownTrigger) -> io::Result<JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = interrupt.recv() => info!("SIGINT received, shutting down"),
                _ = terminate.recv() => info!("SIGTERM received, shutting down"),
            }
            trigger.trigger();
        }))
    }

    #[cfg(not(unix))]
    {
        Ok(tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C received, shutting down");
                trigger.trigger();
            }
        }))
    }
}
