//! Run counters.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Counters for one harness run, shared with whoever wants to watch it.
#[derive(Debug, Default)]
pub struct HarnessStats {
    pub connections_accepted: AtomicU64,
    /// Receive buffers handed to the service
    pub frames_received: AtomicU64,
    pub responses_sent: AtomicU64,
    pub decode_failures: AtomicU64,
    /// Requests that got no response by design
    pub frames_dropped: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl HarnessStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_received(&self, bytes: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn response_sent(&self, bytes: usize) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunReport {
        RunReport {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`HarnessStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub connections_accepted: u64,
    pub frames_received: u64,
    pub responses_sent: u64,
    pub decode_failures: u64,
    pub frames_dropped: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl RunReport {
    pub fn log(&self) {
        info!(
            connections = self.connections_accepted,
            frames = self.frames_received,
            responses = self.responses_sent,
            decode_failures = self.decode_failures,
            dropped = self.frames_dropped,
            bytes_in = self.bytes_read,
            bytes_out = self.bytes_written,
            "Run report"
        );
    }
}
