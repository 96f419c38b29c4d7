//! TFTP server implementation.
//!
//! This module implements the TFTP server that delivers boot files named in
//! the PXE/DHCP replies. The listener receives datagrams on one UDP socket
//! and hands them to the [`TftpEngine`], which answers from the same socket.
//!
//! **Note:** TFTP is served over IPv4 only. IPv6 clients should boot over
//! HTTP instead.

pub mod engine;
pub mod packet;
pub mod session;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::PxeError;
use crate::fs::FileStore;

pub use engine::{TftpEngine, calc_block_size};
pub use packet::{ErrorCode, Opcode};
pub use session::{Stage, TransferMode};
pub use transport::{Transport, UdpTransport};

/// Largest datagram the listener accepts.
const RECV_BUFFER: usize = 65536;

/// TFTP server for PXE boot file delivery (IPv4 only).
pub struct TftpServer {
    socket: Arc<UdpSocket>,
    engine: Arc<TftpEngine>,
}

impl TftpServer {
    /// Binds the TFTP socket and sets up the engine around it.
    ///
    /// # Arguments
    /// * `bind` - listen address, normally port 69
    /// * `files` - store the requested files are resolved in
    /// * `default_block_size` - block size for clients that do not negotiate `blksize`
    pub async fn bind(bind: SocketAddr, files: Arc<dyn FileStore>, default_block_size: usize) -> Result<Self, PxeError> {
        if !bind.is_ipv4() {
            return Err(PxeError::Configuration(format!(
                "TFTP listens on IPv4 only, got {}",
                bind
            )));
        }

        let socket = Arc::new(UdpSocket::bind(bind).await?);
        let transport = Arc::new(UdpTransport::new(Arc::clone(&socket)));
        let engine = Arc::new(TftpEngine::new(files, transport, default_block_size));

        Ok(Self { socket, engine })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, PxeError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn engine(&self) -> &Arc<TftpEngine> {
        &self.engine
    }

    /// Receives datagrams until `shutdown` flips to `true`.
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("TFTP server listening on {}", self.local_addr()?);
        let mut buffer = vec![0u8; RECV_BUFFER];
        if *shutdown.borrow_and_update() {
            info!("TFTP server stopped before serving");
            return Ok(());
        }

        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buffer) => {
                    let (len, source) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            warn!("TFTP receive failed: {}", e);
                            continue;
                        }
                    };
                    if len < 2 {
                        debug!("Received packet too short from {}", source);
                        continue;
                    }
                    self.engine.dispatch(source, &buffer[..len]).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.engine.sessions().clear();
        info!("TFTP server stopped");
        Ok(())
    }
}
