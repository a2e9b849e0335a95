//! TCP listener with bounded accept.

use crate::transport::connection::Connection;
use crate::transport::{SetupError, TransportError, BACKLOG};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, info};

/// A bound, listening IPv4 socket that hands out one connection at a time.
#[derive(Debug)]
pub struct FrameListener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl FrameListener {
    /// Creates, binds and listens on `host:port` with address reuse enabled.
    ///
    /// Port 0 picks an ephemeral port; use [`FrameListener::local_addr`] to
    /// find out which.
    pub fn open(host: Ipv4Addr, port: u16) -> Result<Self, SetupError> {
        let addr = SocketAddr::V4(SocketAddrV4::new(host, port));

        let socket = TcpSocket::new_v4().map_err(SetupError::SocketFailed)?;
        socket
            .set_reuseaddr(true)
            .map_err(SetupError::SocketFailed)?;
        socket
            .bind(addr)
            .map_err(|source| SetupError::BindFailed { addr, source })?;
        let inner = socket
            .listen(BACKLOG)
            .map_err(|source| SetupError::ListenFailed { addr, source })?;

        let local_addr = inner
            .local_addr()
            .map_err(|source| SetupError::ListenFailed { addr, source })?;

        debug!(addr = %local_addr, backlog = BACKLOG, "Listening");
        Ok(Self { inner, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits at most `timeout` for one client.
    pub async fn accept_one(
        &self,
        timeout: Duration,
    ) -> Result<Connection<TcpStream>, TransportError> {
        match tokio::time::timeout(timeout, self.inner.accept()).await {
            Ok(Ok((stream, peer))) => {
                info!(client = %peer, "Client connected");
                Ok(Connection::new(stream, peer))
            }
            Ok(Err(e)) => Err(TransportError::AcceptFailed(e)),
            Err(_) => Err(TransportError::AcceptTimeout),
        }
    }
}
