//! One accepted client connection.

use crate::transport::{TransportError, MAX_FRAME_SIZE};
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

/// A connected byte stream with bounded receives.
///
/// Generic over the stream so tests can drive it with mock I/O; the harness
/// always uses `TcpStream`.
pub struct Connection<S = TcpStream> {
    stream: S,
    peer: SocketAddr,
    scratch: Box<[u8]>,
    bytes_read: u64,
    bytes_written: u64,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            scratch: vec![0u8; MAX_FRAME_SIZE].into_boxed_slice(),
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Performs one read of at most [`MAX_FRAME_SIZE`] bytes, waiting no
    /// longer than `timeout`.
    ///
    /// Whatever a single read returns is treated as the frame; nothing is
    /// reassembled here.
    pub async fn receive_frame(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        let n = match tokio::time::timeout(timeout, self.stream.read(&mut self.scratch)).await {
            Ok(Ok(0)) => return Err(TransportError::PeerClosed),
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(TransportError::RecvFailed(e)),
            Err(_) => return Err(TransportError::RecvTimeout),
        };

        self.bytes_read += n as u64;
        trace!(client = %self.peer, bytes = n, "Read data");

        Ok(Bytes::copy_from_slice(&self.scratch[..n]))
    }

    /// Writes all of `bytes` and flushes.
    pub async fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream
            .write_all(bytes)
            .await
            .map_err(TransportError::SendFailed)?;
        self.stream
            .flush()
            .await
            .map_err(TransportError::SendFailed)?;

        self.bytes_written += bytes.len() as u64;
        trace!(client = %self.peer, bytes = bytes.len(), "Sent response");
        Ok(())
    }

    /// Shuts down the write half; errors are ignored since the peer may
    /// already be gone.
    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

impl<S> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("bytes_read", &self.bytes_read)
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}
