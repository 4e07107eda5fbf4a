//! Networking primitives.
//!
//! The simulation core never touches sockets directly: rooms broadcast
//! through the [`Transport`] trait, and the UDP front end owns the one
//! socket shared by every room. `UdpTransport` is safe for concurrent use:
//! `send_to` on a bound `UdpSocket` is an atomic datagram write.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;

/// Outbound send primitive shared by all rooms.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_to(&self, payload: &[u8], peer: SocketAddr) -> anyhow::Result<()>;
}

/// Production transport over the server's UDP socket.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, payload: &[u8], peer: SocketAddr) -> anyhow::Result<()> {
        self.socket.send_to(payload, peer).await?;
        Ok(())
    }
}

/// Helper for tests: records every datagram instead of sending it.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: std::sync::Mutex<Vec<(SocketAddr, Vec<u8>)>>,
}

impl RecordingTransport {
    pub fn take(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        std::mem::take(&mut *self.sent.lock().expect("transport lock"))
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_to(&self, payload: &[u8], peer: SocketAddr) -> anyhow::Result<()> {
        self.sent
            .lock()
            .expect("transport lock")
            .push((peer, payload.to_vec()));
        Ok(())
    }
}
