//! Per-client TFTP session state.
//!
//! Sessions are keyed by the client's IP address; at most one exists per
//! address. The store's map lock is only held to look up, insert or remove a
//! handle. Everything else happens under the session's own async lock, which
//! serialises file I/O and sends for one client.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::fs::BlockReader;

/// Transfer stage of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Read request accepted, waiting for the ACK of an OACK.
    Handshake,
    Transmitting,
    /// Terminal: aborted.
    Error,
    /// Terminal: final block handed to the transport.
    Done,
}

/// Transfer mode. Only binary transfers are served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferMode {
    #[default]
    Octet,
}

impl TransferMode {
    /// Parses the RRQ mode field (case-insensitive).
    #[must_use]
    pub fn parse(mode: &str) -> Option<Self> {
        mode.eq_ignore_ascii_case("octet").then_some(Self::Octet)
    }
}

/// Options parsed from one read request.
///
/// Keys are `file`, `mode`, `blksize`, `tsize` and `windowsize`. The set lives
/// inside its [`Session`] and is cleared once the handshake is over, so
/// concurrent handshakes never see each other's values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiatedOptions {
    values: HashMap<String, String>,
}

impl NegotiatedOptions {
    const EXTENSIONS: [&'static str; 3] = ["blksize", "tsize", "windowsize"];

    /// Parses the NUL-delimited body of a read request.
    ///
    /// Field 0 is the file name and field 1 the mode; after that every
    /// recognised option name is paired with the field that follows it.
    /// Unknown options and a name without a value are skipped.
    #[must_use]
    pub fn parse(payload: &[u8]) -> Self {
        let mut fields: Vec<String> = payload
            .split(|&b| b == 0)
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect();
        if fields.last().is_some_and(String::is_empty) {
            fields.pop();
        }

        let mut values = HashMap::new();
        let mut iter = fields.into_iter();
        if let Some(file) = iter.next() {
            values.insert("file".to_string(), file);
        }
        if let Some(mode) = iter.next() {
            values.insert("mode".to_string(), mode);
        }

        let rest: Vec<String> = iter.collect();
        for (i, name) in rest.iter().enumerate() {
            let key = name.to_ascii_lowercase();
            if !Self::EXTENSIONS.contains(&key.as_str()) {
                continue;
            }
            if let Some(value) = rest.get(i + 1) {
                values.insert(key, value.clone());
            }
        }

        Self { values }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn file(&self) -> &str {
        self.get("file").unwrap_or_default()
    }

    #[must_use]
    pub fn mode(&self) -> &str {
        self.get("mode").unwrap_or_default()
    }

    /// Requested block size, if present and numeric.
    #[must_use]
    pub fn block_size(&self) -> Option<u64> {
        self.get("blksize")?.trim().parse().ok()
    }

    #[must_use]
    pub fn transfer_size(&self) -> Option<u64> {
        self.get("tsize")?.trim().parse().ok()
    }

    /// Parsed and kept, transfers stay one block per ACK regardless.
    #[must_use]
    pub fn window_size(&self) -> Option<u16> {
        self.get("windowsize")?.trim().parse().ok()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// State of one client transfer.
pub struct Session {
    pub endpoint: SocketAddr,
    pub file_name: Option<PathBuf>,
    pub stage: Stage,
    pub block_counter: u16,
    pub bytes_transferred: u64,
    pub bytes_remaining: u64,
    pub block_size: usize,
    pub mode: TransferMode,
    pub options: NegotiatedOptions,
    pub reader: Option<Box<dyn BlockReader>>,
}

impl Session {
    #[must_use]
    pub fn new(endpoint: SocketAddr, block_size: usize) -> Self {
        Self {
            endpoint,
            file_name: None,
            stage: Stage::Handshake,
            block_counter: 0,
            bytes_transferred: 0,
            bytes_remaining: 0,
            block_size,
            mode: TransferMode::Octet,
            options: NegotiatedOptions::default(),
            reader: None,
        }
    }

    /// Drops the file handle.
    pub fn close(&mut self) {
        self.reader = None;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("file_name", &self.file_name)
            .field("stage", &self.stage)
            .field("block_counter", &self.block_counter)
            .field("bytes_transferred", &self.bytes_transferred)
            .field("bytes_remaining", &self.bytes_remaining)
            .field("block_size", &self.block_size)
            .field("open", &self.reader.is_some())
            .finish_non_exhaustive()
    }
}

pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// Map from client address to its session.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<IpAddr, SessionHandle>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<IpAddr, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn get(&self, address: IpAddr) -> Option<SessionHandle> {
        self.map().get(&address).cloned()
    }

    /// Returns the session for `endpoint`'s address, creating one if needed.
    ///
    /// The returned flag is `true` when the session already existed; the
    /// caller then owns updating its endpoint.
    pub fn get_or_insert(&self, endpoint: SocketAddr, block_size: usize) -> (SessionHandle, bool) {
        let mut map = self.map();
        if let Some(handle) = map.get(&endpoint.ip()) {
            return (Arc::clone(handle), true);
        }
        let handle = Arc::new(tokio::sync::Mutex::new(Session::new(endpoint, block_size)));
        map.insert(endpoint.ip(), Arc::clone(&handle));
        (handle, false)
    }

    pub fn remove(&self, address: IpAddr) -> Option<SessionHandle> {
        self.map().remove(&address)
    }

    /// Removes the entry for `address` only if it still is `handle`.
    ///
    /// Returns `false` when the address was re-registered in the meantime.
    pub fn remove_if_current(&self, address: IpAddr, handle: &SessionHandle) -> bool {
        let mut map = self.map();
        match map.get(&address) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                map.remove(&address);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn contains(&self, address: IpAddr) -> bool {
        self.map().contains_key(&address)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    /// Drops every session, closing their files once no handler holds them anymore.
    pub fn clear(&self) {
        self.map().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8, port: u16) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, last], port))
    }

    #[test]
    fn test_parse_file_mode_and_options() {
        let options =
            NegotiatedOptions::parse(b"boot.bin\0octet\0blksize\01468\0tsize\00\0windowsize\04\0");
        assert_eq!(options.file(), "boot.bin");
        assert_eq!(options.mode(), "octet");
        assert_eq!(options.block_size(), Some(1468));
        assert_eq!(options.transfer_size(), Some(0));
        assert_eq!(options.window_size(), Some(4));
    }

    #[test]
    fn test_parse_ignores_unknown_and_dangling_options() {
        let options = NegotiatedOptions::parse(b"f\0octet\0timeout\05\0BLKSIZE\0");
        assert_eq!(options.get("timeout"), None);
        assert_eq!(options.block_size(), None, "Option without value is skipped");
    }

    #[test]
    fn test_parse_option_names_are_case_insensitive() {
        let options = NegotiatedOptions::parse(b"f\0octet\0BlkSize\0512\0");
        assert_eq!(options.block_size(), Some(512));
    }

    #[test]
    fn test_parse_empty_payload() {
        let options = NegotiatedOptions::parse(b"");
        assert_eq!(options.file(), "");
        assert_eq!(options.mode(), "");
    }

    #[test]
    fn test_non_numeric_block_size_is_none() {
        let options = NegotiatedOptions::parse(b"f\0octet\0blksize\0big\0");
        assert_eq!(options.get("blksize"), Some("big"));
        assert_eq!(options.block_size(), None);
    }

    #[test]
    fn test_transfer_mode_parse() {
        assert_eq!(TransferMode::parse("octet"), Some(TransferMode::Octet));
        assert_eq!(TransferMode::parse("OCTET"), Some(TransferMode::Octet));
        assert_eq!(TransferMode::parse("netascii"), None);
    }

    #[test]
    fn test_store_one_session_per_address() {
        let store = SessionStore::new();
        let (first, existed) = store.get_or_insert(addr(1, 2000), 512);
        assert!(!existed);
        let (second, existed) = store.get_or_insert(addr(1, 3000), 512);
        assert!(existed);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);

        store.get_or_insert(addr(2, 2000), 512);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remove_if_current_ignores_replaced_sessions() {
        let store = SessionStore::new();
        let (old, _) = store.get_or_insert(addr(1, 2000), 512);
        store.remove(addr(1, 2000).ip());
        let (new, _) = store.get_or_insert(addr(1, 2000), 512);

        assert!(!store.remove_if_current(addr(1, 0).ip(), &old));
        assert!(store.contains(addr(1, 0).ip()));
        assert!(store.remove_if_current(addr(1, 0).ip(), &new));
        assert!(store.is_empty());
    }
}
