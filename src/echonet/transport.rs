//! # ECHONET Lite Transport
//!
//! Byte-level request/response plumbing bound to one peer. The audit drivers
//! only see the [`EchonetTransport`] trait, so they run unchanged over UDP or
//! over [`MockTransport`](super::transport_mock::MockTransport) in tests.

use crate::constants::{ECHONET_PORT, MAX_DATAGRAM_SIZE};
use crate::echonet::frame::{pack_frame, parse_frame, Frame};
use crate::error::EchonetError;
use crate::log_warn_throttled;
use crate::util::logging::{log_frame_hex, LogThrottle};
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;

/// Send/receive primitives for one peer node.
#[async_trait]
pub trait EchonetTransport: Send {
    /// Sends one frame to the peer.
    async fn send(&mut self, frame: &Frame) -> Result<(), EchonetError>;

    /// Waits up to `timeout` for the next frame from the peer.
    async fn receive(&mut self, timeout: Duration) -> Result<Frame, EchonetError>;

    /// Address of the peer node.
    fn peer(&self) -> SocketAddr;

    /// Sends `frame` and waits for the next frame from the peer.
    async fn request(&mut self, frame: &Frame, timeout: Duration) -> Result<Frame, EchonetError> {
        self.send(frame).await?;
        self.receive(timeout).await
    }
}

/// UDP transport on the ECHONET Lite port.
///
/// Several transports may share one bound socket; each keeps only the
/// datagrams coming from its own peer.
#[derive(Debug)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    stray_throttle: LogThrottle,
}

impl UdpTransport {
    /// Binds a new socket on `local` and targets `peer` on port 3610.
    pub async fn bind(local: SocketAddr, peer: IpAddr) -> Result<Self, EchonetError> {
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| EchonetError::Transport(format!("bind {local}: {e}")))?;
        Ok(Self::with_socket(Arc::new(socket), peer))
    }

    /// Reuses an already bound socket.
    pub fn with_socket(socket: Arc<UdpSocket>, peer: IpAddr) -> Self {
        UdpTransport {
            socket,
            peer: SocketAddr::new(peer, ECHONET_PORT),
            stray_throttle: LogThrottle::new(1000, 5),
        }
    }
}

#[async_trait]
impl EchonetTransport for UdpTransport {
    async fn send(&mut self, frame: &Frame) -> Result<(), EchonetError> {
        let bytes = pack_frame(frame);
        log_frame_hex(&format!("send to {}", self.peer), &bytes);
        self.socket
            .send_to(&bytes, self.peer)
            .await
            .map_err(|e| EchonetError::Transport(format!("send to {}: {e}", self.peer)))?;
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Frame, EchonetError> {
        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(EchonetError::Timeout(timeout));
            }

            let (len, from) = tokio::time::timeout(remaining, self.socket.recv_from(&mut buf))
                .await
                .map_err(|_| EchonetError::Timeout(timeout))?
                .map_err(|e| EchonetError::Transport(format!("receive: {e}")))?;

            if from.ip() != self.peer.ip() {
                log_warn_throttled!(
                    self.stray_throttle,
                    "dropping datagram from {} while waiting for {}",
                    from,
                    self.peer
                );
                continue;
            }

            log_frame_hex(&format!("recv from {from}"), &buf[..len]);
            let frame = parse_frame(&buf[..len])?;
            if !frame.is_echonet_lite() {
                return Err(EchonetError::NotEchonet {
                    ehd1: frame.ehd1,
                    ehd2: frame.ehd2,
                });
            }
            return Ok(frame);
        }
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }
}
