//! In-memory collaborators for unit testing
//!
//! [`RecordingTransport`] captures every datagram instead of sending it and
//! [`MemoryFileStore`] serves files from a map, so the TFTP engine and the
//! boot file selector can be driven without sockets or a TFTP root on disk.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::fs::{BlockReader, FileStore};
use crate::tftp::transport::Transport;

/// Transport that records sent datagrams.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `send` fail with `BrokenPipe`.
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Returns and forgets everything sent so far.
    pub fn take(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, destination: SocketAddr, payload: &[u8]) -> io::Result<usize> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.sent.lock().unwrap().push((destination, payload.to_vec()));
        Ok(payload.len())
    }
}

/// File store over an in-memory map, rooted at a virtual directory.
#[derive(Debug, Clone)]
pub struct MemoryFileStore {
    root: PathBuf,
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
}

impl MemoryFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Adds a file at `name`, relative to the root, with `/` separators.
    pub fn insert(&self, name: &str, content: Vec<u8>) {
        self.files.lock().unwrap().insert(self.root.join(name), content);
    }

    fn get(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    async fn size(&self, path: &Path) -> io::Result<u64> {
        Ok(self.get(path)?.len() as u64)
    }

    async fn open(&self, path: &Path) -> io::Result<Box<dyn BlockReader>> {
        Ok(Box::new(io::Cursor::new(self.get(path)?)))
    }
}
