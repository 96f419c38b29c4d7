//! TFTP protocol engine.
//!
//! Drives one [`Session`] per client through
//! `Handshake -> Transmitting -> Done | Error`. The engine is purely
//! reactive: every step is triggered by a datagram (or by the completion of
//! a send) and there are no timers. Lost packets are recovered by the client
//! repeating its last request or ACK.
//!
//! Each session is removed from the store as soon as it reaches `Done` or
//! `Error`.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::TransferError;
use crate::fs::{BlockReader, FileStore};
use crate::tftp::packet::{ErrorCode, Packet, Reply};
use crate::tftp::session::{NegotiatedOptions, Session, SessionStore, Stage, TransferMode};
use crate::tftp::transport::Transport;

/// Block size used when the client does not negotiate `blksize` (RFC 1350).
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Smallest block size accepted from `blksize` (RFC 2348).
pub const MIN_BLOCK_SIZE: u64 = 8;

/// Largest block size accepted from `blksize` (RFC 2348).
pub const MAX_BLOCK_SIZE: u64 = 65464;

/// Picks the block size for a transfer of `total_size` bytes.
///
/// Block numbers are 16 bit. The requested size is kept unless the
/// resulting block count `q = total_size / requested` reaches 65535 while
/// `q` itself is no larger than the requested size; then `q` is used,
/// saturated to the 16-bit range.
///
/// ```
/// use pxe_server::tftp::engine::calc_block_size;
///
/// assert_eq!(calc_block_size(1_000_000, 512), 512);
/// assert_eq!(calc_block_size(40_000_000, 512), 512);
/// ```
#[must_use]
pub fn calc_block_size(total_size: u64, requested: u64) -> u64 {
    if requested == 0 {
        return requested;
    }

    let q = total_size / requested;
    if q < u64::from(u16::MAX) {
        requested
    } else if q <= requested {
        q.min(u64::from(u16::MAX))
    } else {
        requested
    }
}

/// Per-server TFTP state machine.
///
/// Owns the session map; the negotiated options of a request live in its
/// session. Handlers are `async` and may run concurrently for different
/// clients.
pub struct TftpEngine {
    sessions: SessionStore,
    files: Arc<dyn FileStore>,
    transport: Arc<dyn Transport>,
    default_block_size: usize,
}

impl TftpEngine {
    /// Creates an engine serving files from `files` and replying through `transport`.
    ///
    /// # Arguments
    /// * `default_block_size` - data block size when the client does not send `blksize`
    pub fn new(
        files: Arc<dyn FileStore>,
        transport: Arc<dyn Transport>,
        default_block_size: usize,
    ) -> Self {
        Self {
            sessions: SessionStore::new(),
            files,
            transport,
            default_block_size: default_block_size.max(1),
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Entry point for one received datagram.
    ///
    /// Read requests and ACKs are handled on their own task so intake of
    /// further datagrams is not blocked; the task handle is returned. Client
    /// errors and unknown opcodes are handled before this returns.
    pub async fn dispatch(self: &Arc<Self>, source: SocketAddr, datagram: &[u8]) -> Option<JoinHandle<()>> {
        let packet = match Packet::decode(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Dropping datagram from {}: {}", source, e);
                return None;
            }
        };

        match packet {
            Packet::ReadRequest(body) => {
                let engine = Arc::clone(self);
                let body = body.to_vec();
                Some(tokio::spawn(async move {
                    engine.handle_read_request(source, &body).await;
                }))
            }
            Packet::Ack(block) => {
                if !self.sessions.contains(source.ip()) {
                    debug!("ACK {} from {} without session", block, source);
                    return None;
                }
                let engine = Arc::clone(self);
                Some(tokio::spawn(async move {
                    engine.handle_ack(source, block).await;
                }))
            }
            Packet::Error { code, message } => {
                let err = TransferError::ClientOriginated { code, message };
                self.handle_error(err.code(), &err.to_string(), source, true)
                    .await;
                None
            }
            Packet::Unsupported(opcode) => {
                let err = TransferError::IllegalOperation(opcode);
                self.handle_error(err.code(), &err.to_string(), source, false)
                    .await;
                None
            }
        }
    }

    /// Handles the body of a read request from `source`.
    ///
    /// Failures are answered with an ERR packet and leave no session behind.
    pub async fn handle_read_request(&self, source: SocketAddr, payload: &[u8]) {
        let options = NegotiatedOptions::parse(payload);

        if let Err(err) = self.start_transfer(source, options).await {
            self.handle_error(err.code(), &err.to_string(), source, false)
                .await;
            return;
        }
        self.on_send_completed(source).await;
    }

    async fn start_transfer(&self, source: SocketAddr, options: NegotiatedOptions) -> Result<(), TransferError> {
        let mode = TransferMode::parse(options.mode())
            .ok_or_else(|| TransferError::UnsupportedMode(options.mode().to_string()))?;

        let path = self.files.resolve(options.file())?;
        if !self.files.exists(&path).await {
            return Err(TransferError::NotFound(options.file().to_string()));
        }
        let size = self.files.size(&path).await?;
        let reader = self.files.open(&path).await?;

        let (handle, existed) = self.sessions.get_or_insert(source, self.default_block_size);
        let mut session = handle.lock().await;
        if existed {
            debug!("Restarting transfer for {} (was {:?})", source, session.file_name);
        }

        session.endpoint = source;
        session.file_name = Some(path.clone());
        session.stage = Stage::Handshake;
        session.mode = mode;
        session.block_counter = 0;
        session.bytes_transferred = 0;
        session.bytes_remaining = size;
        session.block_size = self.default_block_size;
        session.reader = Some(reader);
        session.options = options;

        info!("Sending {} ({} bytes) to {}", path.display(), size, source);

        if let Some(requested) = session.options.block_size() {
            let requested = requested.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE);
            let effective = calc_block_size(size, requested);
            session.block_size = usize::try_from(effective).unwrap_or(DEFAULT_BLOCK_SIZE);
            if let Some(window) = session.options.window_size() {
                debug!("Client {} asked for windowsize {}, sending one block per ACK", source, window);
            }

            let accepted = [("blksize", effective.to_string()), ("tsize", size.to_string())];
            self.send(session.endpoint, &Reply::OptionAck(&accepted)).await?;
            return Ok(());
        }

        session.stage = Stage::Transmitting;
        session.block_counter = 1;
        let result = self.read_and_send_next_block(&mut session).await;
        session.options.clear();
        result
    }

    /// Handles an ACK for `block` from `source`.
    ///
    /// Only the ACK for the block last sent (or for the OACK, block 0)
    /// advances the transfer; duplicates and out-of-order ACKs are ignored
    /// and nothing is retransmitted.
    pub async fn handle_ack(&self, source: SocketAddr, block: u16) {
        let Some(handle) = self.sessions.get(source.ip()) else {
            return;
        };

        let result = {
            let mut session = handle.lock().await;
            if session.file_name.is_none() {
                return;
            }
            if !matches!(session.stage, Stage::Handshake | Stage::Transmitting) {
                debug!("ACK {} from {} in stage {:?} ignored", block, source, session.stage);
                return;
            }
            if block != session.block_counter {
                debug!(
                    "ACK {} from {} ignored, expecting {}",
                    block, source, session.block_counter
                );
                return;
            }

            session.block_counter = session.block_counter.wrapping_add(1);
            if session.stage == Stage::Handshake {
                session.stage = Stage::Transmitting;
                session.options.clear();
            }
            self.read_and_send_next_block(&mut session).await
        };

        match result {
            Ok(()) => self.on_send_completed(source).await,
            Err(err) => {
                self.handle_error(err.code(), &err.to_string(), source, false)
                    .await;
            }
        }
    }

    /// Reads the next block of `session`'s file and sends it.
    ///
    /// The block is final once no more than one block size is left; the
    /// session is then marked `Done` after the send.
    async fn read_and_send_next_block(&self, session: &mut Session) -> Result<(), TransferError> {
        if session.reader.is_none() {
            let path = session
                .file_name
                .clone()
                .ok_or_else(|| TransferError::Io(io::Error::other("session has no file")))?;
            session.reader = Some(self.files.open(&path).await?);
        }

        let is_final = session.bytes_remaining <= session.block_size as u64;
        let length = if is_final {
            usize::try_from(session.bytes_remaining).unwrap_or(session.block_size)
        } else {
            session.block_size
        };

        let chunk = match session.reader.as_mut() {
            Some(reader) => read_block(reader, length).await?,
            None => Vec::new(),
        };
        if chunk.len() < length {
            return Err(TransferError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, read {}", length, chunk.len()),
            )));
        }

        session.bytes_transferred += chunk.len() as u64;
        session.bytes_remaining = session.bytes_remaining.saturating_sub(chunk.len() as u64);

        let reply = Reply::Data {
            block: session.block_counter,
            payload: &chunk,
        };
        self.send(session.endpoint, &reply).await?;

        if is_final {
            session.stage = Stage::Done;
        }
        Ok(())
    }

    /// Aborts the session of `source`, if any.
    ///
    /// Errors raised by the server are reported to the client; errors the
    /// client sent itself are only logged, never answered.
    pub async fn handle_error(&self, code: ErrorCode, message: &str, source: SocketAddr, client_originated: bool) {
        let handle = self.sessions.get(source.ip());
        if let Some(handle) = &handle {
            let mut session = handle.lock().await;
            session.stage = Stage::Error;
            session.close();
        }

        if !client_originated {
            let reply = Reply::Error { code, message };
            match reply.to_bytes() {
                Ok(bytes) => {
                    if let Err(e) = self.transport.send(source, &bytes).await {
                        warn!("Failed to send error to {}: {}", source, e);
                    }
                }
                Err(e) => warn!("Failed to encode error for {}: {}", source, e),
            }
        }

        error!("[TFTP] {}: {}", code, message);

        if let Some(handle) = handle {
            self.sessions.remove_if_current(source.ip(), &handle);
        }
    }

    /// Send-completion hook: frees the session of `source` once its last block is out.
    pub async fn on_send_completed(&self, source: SocketAddr) {
        let Some(handle) = self.sessions.get(source.ip()) else {
            return;
        };

        let mut session = handle.lock().await;
        if session.stage != Stage::Done {
            return;
        }
        session.close();
        info!(
            "Transfer of {} to {} complete ({} bytes)",
            session
                .file_name
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            session.endpoint,
            session.bytes_transferred
        );
        drop(session);
        self.sessions.remove_if_current(source.ip(), &handle);
    }

    async fn send(&self, endpoint: SocketAddr, reply: &Reply<'_>) -> Result<(), TransferError> {
        let bytes = reply.to_bytes()?;
        self.transport.send(endpoint, &bytes).await?;
        Ok(())
    }
}

/// Reads up to `length` bytes, stopping early only at end of file.
async fn read_block(reader: &mut Box<dyn BlockReader>, length: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; length];
    let mut filled = 0;
    while filled < length {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}
