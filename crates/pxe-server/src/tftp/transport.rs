//! Datagram transport used by the TFTP engine to reach its clients.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;

/// Outbound half of the transport.
///
/// `send` resolves once the datagram has been handed to the network stack;
/// the engine runs its send-completion hook after that.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, destination: SocketAddr, payload: &[u8]) -> io::Result<usize>;
}

/// [`Transport`] over the server's UDP socket.
#[derive(Debug, Clone)]
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
    async fn send(&self, destination: SocketAddr, payload: &[u8]) -> io::Result<usize> {
        self.socket.send_to(payload, destination).await
    }
}
