//! Frame Transport Module
//!
//! Plain TCP plumbing for the harnesses: one listener, one connection at a
//! time, and every wait bounded by a timeout.
//!
//! ```text
//! FrameListener::open(host, port)     SO_REUSEADDR, backlog 5
//!        │
//!        │ accept_one(timeout)
//!        ▼
//! Connection ── receive_frame(timeout) ──> Bytes (≤ 64 KiB, one read)
//!            ── send_bytes(&[u8])      ──> write_all + flush
//! ```
//!
//! The transport never retries. Timeouts come back as ordinary errors and the
//! caller's lifecycle policy decides what they mean.

pub mod connection;
pub mod listener;

pub use connection::Connection;
pub use listener::FrameListener;

use std::io;
use std::net::SocketAddr;

/// Listen backlog for harness sockets.
pub const BACKLOG: u32 = 5;

/// Upper bound on a single receive.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Errors while creating the listening socket. These are fatal.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to create socket: {0}")]
    SocketFailed(#[source] io::Error),

    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to listen on {addr}: {source}")]
    ListenFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Errors on an accept, receive or send. None of these are fatal by
/// themselves.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("timed out waiting for a client")]
    AcceptTimeout,

    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    #[error("timed out waiting for data")]
    RecvTimeout,

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("receive failed: {0}")]
    RecvFailed(#[source] io::Error),

    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::AcceptTimeout | Self::RecvTimeout)
    }
}
