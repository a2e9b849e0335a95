//! The accept/serve loop.

use crate::config::{HarnessConfig, Lifecycle, Timeouts};
use crate::harness::stats::{HarnessStats, RunReport};
use crate::harness::{FrameService, ReplyPolicy};
use crate::shutdown::Shutdown;
use crate::synth::MINIMAL_RESPONSE;
use crate::transport::{Connection, FrameListener, SetupError, TransportError};
use bytes::Bytes;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, trace, warn};

/// Where the orchestrator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    Listening,
    Accepted,
    Serving,
    Terminated,
}

impl fmt::Display for HarnessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HarnessState::Listening => "LISTENING",
            HarnessState::Accepted => "ACCEPTED",
            HarnessState::Serving => "SERVING",
            HarnessState::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

/// Why serving a connection stopped.
#[derive(Debug)]
pub enum ServeEnd {
    PeerClosed,
    RecvTimeout,
    Shutdown,
    Transport(TransportError),
}

impl fmt::Display for ServeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeEnd::PeerClosed => write!(f, "peer closed"),
            ServeEnd::RecvTimeout => write!(f, "receive timeout"),
            ServeEnd::Shutdown => write!(f, "shutdown requested"),
            ServeEnd::Transport(e) => write!(f, "{}", e),
        }
    }
}

/// A bound harness for one protocol service.
pub struct Harness<S> {
    listener: FrameListener,
    service: S,
    lifecycle: Lifecycle,
    timeouts: Timeouts,
    shutdown: Shutdown,
    stats: Arc<HarnessStats>,
    state: HarnessState,
}

impl<S: FrameService> Harness<S> {
    /// Opens the listening socket described by `config`.
    pub fn bind(config: &HarnessConfig, service: S, shutdown: Shutdown) -> Result<Self, SetupError> {
        let listener = FrameListener::open(config.host, config.port)?;

        Ok(Self {
            listener,
            service,
            lifecycle: config.lifecycle,
            timeouts: config.timeouts,
            shutdown,
            stats: Arc::new(HarnessStats::new()),
            state: HarnessState::Listening,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> Arc<HarnessStats> {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    fn set_state(&mut self, state: HarnessState) {
        if self.state != state {
            trace!(from = %self.state, to = %state, "State change");
            self.state = state;
        }
    }

    /// Runs until the lifecycle policy or the shutdown flag ends it.
    pub async fn run(&mut self) -> RunReport {
        info!(
            service = self.service.name(),
            addr = %self.local_addr(),
            lifecycle = %self.lifecycle,
            policy = ?self.service.reply_policy(),
            "Harness listening"
        );
        self.service.log_startup();

        while !self.shutdown.is_requested() {
            self.set_state(HarnessState::Listening);

            let mut conn = match self.listener.accept_one(self.timeouts.accept).await {
                Ok(conn) => conn,
                Err(e) => match self.lifecycle {
                    Lifecycle::SingleShot => {
                        info!(error = %e, "No connection to serve");
                        break;
                    }
                    Lifecycle::Persistent if e.is_timeout() => {
                        trace!("Accept timed out, still listening");
                        continue;
                    }
                    Lifecycle::Persistent => {
                        warn!(error = %e, "Accept failed, still listening");
                        continue;
                    }
                },
            };

            self.stats.connection_accepted();
            self.set_state(HarnessState::Accepted);
            self.set_state(HarnessState::Serving);

            let peer = conn.peer_addr();
            let end = serve_connection(
                &mut self.service,
                &mut conn,
                self.lifecycle,
                self.timeouts.recv,
                &self.shutdown,
                &self.stats,
            )
            .await;

            match &end {
                ServeEnd::Transport(e) => warn!(
                    client = %peer,
                    error = %e,
                    bytes_in = conn.bytes_read(),
                    bytes_out = conn.bytes_written(),
                    "Connection ended with error"
                ),
                _ => info!(
                    client = %peer,
                    reason = %end,
                    bytes_in = conn.bytes_read(),
                    bytes_out = conn.bytes_written(),
                    "Connection finished"
                ),
            }

            conn.close().await;
            self.service.on_connection_reset();

            if self.lifecycle == Lifecycle::SingleShot {
                break;
            }
        }

        self.set_state(HarnessState::Terminated);
        let report = self.stats.snapshot();
        report.log();
        report
    }
}

/// Serves one connection until it closes, fails, or shutdown is requested.
///
/// A receive timeout ends single-shot serving; in persistent mode the
/// connection stays open and the service is told it went idle.
pub async fn serve_connection<S, T>(
    service: &mut S,
    conn: &mut Connection<T>,
    lifecycle: Lifecycle,
    recv_timeout: Duration,
    shutdown: &Shutdown,
    stats: &HarnessStats,
) -> ServeEnd
where
    S: FrameService,
    T: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        if shutdown.is_requested() {
            return ServeEnd::Shutdown;
        }

        let frame = match conn.receive_frame(recv_timeout).await {
            Ok(frame) => frame,
            Err(TransportError::RecvTimeout) => match lifecycle {
                Lifecycle::SingleShot => return ServeEnd::RecvTimeout,
                Lifecycle::Persistent => {
                    trace!(client = %conn.peer_addr(), "Receive timed out, connection kept");
                    service.on_idle();
                    continue;
                }
            },
            Err(TransportError::PeerClosed) => return ServeEnd::PeerClosed,
            Err(e) => return ServeEnd::Transport(e),
        };

        stats.frame_received(frame.len());
        debug!(client = %conn.peer_addr(), bytes = frame.len(), "Received frame");

        let mut replies = service.on_receive(&frame, stats);
        if replies.is_empty() && service.reply_policy() == ReplyPolicy::AlwaysReply {
            warn!("Service produced no reply, sending minimal response");
            replies.push(Bytes::from_static(&MINIMAL_RESPONSE));
        }

        for reply in replies {
            if let Err(e) = conn.send_bytes(&reply).await {
                return ServeEnd::Transport(e);
            }
            stats.response_sent(reply.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use crate::harness::{EncapsService, SlmpService};
    use crate::protocol::enip::{EncapsCommand, EncapsHeader, EncapsStatus};
    use crate::protocol::slmp::ResponseFrame;
    use crate::shutdown;
    use std::net::Ipv4Addr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::task::JoinHandle;
    use tokio_test::io::Builder;

    /// A service that never builds a reply itself.
    struct SilentService {
        policy: ReplyPolicy,
    }

    impl FrameService for SilentService {
        fn name(&self) -> &'static str {
            "silent"
        }

        fn reply_policy(&self) -> ReplyPolicy {
            self.policy
        }

        fn on_receive(&mut self, _frame: &[u8], _stats: &HarnessStats) -> Vec<Bytes> {
            Vec::new()
        }
    }

    fn mock_peer() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 40000))
    }

    fn test_config(lifecycle: Lifecycle) -> HarnessConfig {
        HarnessConfig {
            host: Ipv4Addr::LOCALHOST,
            port: 0,
            lifecycle,
            timeouts: Timeouts {
                accept: Duration::from_millis(500),
                recv: Duration::from_millis(100),
            },
            ..HarnessConfig::new(Protocol::Slmp)
        }
    }

    fn start<S>(mut harness: Harness<S>) -> JoinHandle<(Harness<S>, RunReport)>
    where
        S: FrameService + Send + 'static,
    {
        tokio::spawn(async move {
            let report = harness.run().await;
            (harness, report)
        })
    }

    async fn read_exact(client: &mut TcpStream, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_register_session_success() {
        let harness = Harness::bind(
            &test_config(Lifecycle::SingleShot),
            EncapsService::new(),
            Shutdown::never(),
        )
        .unwrap();
        let addr = harness.local_addr();
        let handle = start(harness);

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut request = [0u8; 24];
        request[0] = 0x65;
        client.write_all(&request).await.unwrap();

        let reply = read_exact(&mut client, 24).await;
        let header = EncapsHeader::decode(&reply).unwrap();
        assert_eq!(header.command, EncapsCommand::REGISTER_SESSION);
        assert_eq!(header.session_handle, 0);
        assert_eq!(header.status, EncapsStatus::SUCCESS);
        assert_eq!(header.length, 0);

        drop(client);
        let (harness, report) = handle.await.unwrap();
        assert_eq!(harness.state(), HarnessState::Terminated);
        assert_eq!(report.responses_sent, 1);
    }

    #[tokio::test]
    async fn test_truncated_request_gets_error_reply() {
        let harness = Harness::bind(
            &test_config(Lifecycle::SingleShot),
            EncapsService::new(),
            Shutdown::never(),
        )
        .unwrap();
        let addr = harness.local_addr();
        let handle = start(harness);

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&[0x6F, 0x00, 0x10, 0x00]).await.unwrap();

        let reply = read_exact(&mut client, 24).await;
        let header = EncapsHeader::decode(&reply).unwrap();
        assert_eq!(header.command, EncapsCommand::SEND_RR_DATA);
        assert_eq!(header.session_handle, 0);
        assert_eq!(header.status, EncapsStatus::INVALID_FORMAT_OR_DATA);

        drop(client);
        let (_, report) = handle.await.unwrap();
        assert_eq!(report.decode_failures, 1);
    }

    #[tokio::test]
    async fn test_slmp_loopback_echo() {
        let harness = Harness::bind(
            &test_config(Lifecycle::SingleShot),
            SlmpService::default(),
            Shutdown::never(),
        )
        .unwrap();
        let addr = harness.local_addr();
        let handle = start(harness);

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"500000FF03FF0000160010061900000006ABCDEF")
            .await
            .unwrap();

        // D000 00 FF 03FF 00 000E 0000 0006ABCDEF
        let reply = read_exact(&mut client, 32).await;
        let response = ResponseFrame::decode(&reply).unwrap();
        assert_eq!(response.end_code, 0);
        assert_eq!(&response.data[..], b"0006ABCDEF");

        drop(client);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_persistent_survives_idle_timeout() {
        let (trigger, shutdown) = shutdown::channel();
        let harness = Harness::bind(
            &test_config(Lifecycle::Persistent),
            SlmpService::default(),
            shutdown,
        )
        .unwrap();
        let addr = harness.local_addr();
        let stats = harness.stats();
        let handle = start(harness);

        let mut client = TcpStream::connect(addr).await.unwrap();

        // several receive timeouts elapse on the idle connection
        tokio::time::sleep(Duration::from_millis(350)).await;

        client
            .write_all(b"500000FF03FF0000110010061900000001Z")
            .await
            .unwrap();
        let reply = read_exact(&mut client, 27).await;
        assert_eq!(&reply[22..], b"0001Z");
        assert_eq!(stats.snapshot().connections_accepted, 1);

        trigger.trigger();
        let (harness, report) = handle.await.unwrap();
        assert_eq!(harness.state(), HarnessState::Terminated);
        assert_eq!(report.connections_accepted, 1);
        assert_eq!(report.responses_sent, 1);
    }

    #[tokio::test]
    async fn test_persistent_reaccepts() {
        let (trigger, shutdown) = shutdown::channel();
        let harness = Harness::bind(
            &test_config(Lifecycle::Persistent),
            EncapsService::new(),
            shutdown,
        )
        .unwrap();
        let addr = harness.local_addr();
        let handle = start(harness);

        for _ in 0..2 {
            let mut client = TcpStream::connect(addr).await.unwrap();
            client.write_all(&[0u8; 24]).await.unwrap();
            read_exact(&mut client, 24).await;
        }

        trigger.trigger();
        let (_, report) = handle.await.unwrap();
        assert_eq!(report.connections_accepted, 2);
    }

    #[tokio::test]
    async fn test_single_shot_does_not_reaccept() {
        let harness = Harness::bind(
            &test_config(Lifecycle::SingleShot),
            EncapsService::new(),
            Shutdown::never(),
        )
        .unwrap();
        let addr = harness.local_addr();
        let handle = start(harness);

        let client = TcpStream::connect(addr).await.unwrap();
        drop(client);

        let (harness, report) = handle.await.unwrap();
        assert_eq!(harness.state(), HarnessState::Terminated);
        assert_eq!(report.connections_accepted, 1);
        assert_eq!(report.frames_received, 0);
    }

    #[tokio::test]
    async fn test_always_reply_substitutes_minimal_response() {
        let mock = Builder::new()
            .read(b"\x01\x02\x03")
            .write(&MINIMAL_RESPONSE)
            .build();
        let mut conn = Connection::new(mock, mock_peer());
        let mut service = SilentService {
            policy: ReplyPolicy::AlwaysReply,
        };
        let stats = HarnessStats::new();

        let end = serve_connection(
            &mut service,
            &mut conn,
            Lifecycle::SingleShot,
            Duration::from_secs(1),
            &Shutdown::never(),
            &stats,
        )
        .await;

        assert!(matches!(end, ServeEnd::PeerClosed));
        assert_eq!(conn.bytes_written(), 24);
        assert_eq!(stats.snapshot().responses_sent, 1);
    }

    #[tokio::test]
    async fn test_handler_decides_sends_nothing() {
        // any write would fail the mock
        let mock = Builder::new().read(b"\x01\x02\x03").build();
        let mut conn = Connection::new(mock, mock_peer());
        let mut service = SilentService {
            policy: ReplyPolicy::HandlerDecides,
        };
        let stats = HarnessStats::new();

        let end = serve_connection(
            &mut service,
            &mut conn,
            Lifecycle::SingleShot,
            Duration::from_secs(1),
            &Shutdown::never(),
            &stats,
        )
        .await;

        assert!(matches!(end, ServeEnd::PeerClosed));
        assert_eq!(conn.bytes_written(), 0);
        assert_eq!(stats.snapshot().frames_received, 1);
        assert_eq!(stats.snapshot().responses_sent, 0);
    }

    #[tokio::test]
    async fn test_single_shot_accept_timeout_terminates() {
        let harness = Harness::bind(
            &test_config(Lifecycle::SingleShot),
            SlmpService::default(),
            Shutdown::never(),
        )
        .unwrap();
        let (harness, report) = start(harness).await.unwrap();

        assert_eq!(harness.state(), HarnessState::Terminated);
        assert_eq!(report.connections_accepted, 0);
    }
}
