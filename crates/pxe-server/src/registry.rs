//! Registry of known boot servers.
//!
//! The registry is built once at startup from a [`ServerListSource`] plus a
//! synthetic entry for this server, and is read-only afterwards. Its order
//! is the order of the boot menu and boot server list sent to clients.

use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PxeConfig;
use crate::error::PxeError;

/// Boot server types defined by PXE 2.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum BootServerType {
    #[default]
    PxeBootstrap,
    MicrosoftWindowsNt,
    IntelLcm,
    DosUndi,
    NecEsmpro,
    IbmWsod,
    IbmLccm,
    CaUnicenterTng,
    HpOpenView,
    /// Reserved or vendor specific type.
    Other(u16),
}

impl From<u16> for BootServerType {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::PxeBootstrap,
            1 => Self::MicrosoftWindowsNt,
            2 => Self::IntelLcm,
            3 => Self::DosUndi,
            4 => Self::NecEsmpro,
            5 => Self::IbmWsod,
            6 => Self::IbmLccm,
            7 => Self::CaUnicenterTng,
            8 => Self::HpOpenView,
            other => Self::Other(other),
        }
    }
}

impl From<BootServerType> for u16 {
    fn from(value: BootServerType) -> Self {
        match value {
            BootServerType::PxeBootstrap => 0,
            BootServerType::MicrosoftWindowsNt => 1,
            BootServerType::IntelLcm => 2,
            BootServerType::DosUndi => 3,
            BootServerType::NecEsmpro => 4,
            BootServerType::IbmWsod => 5,
            BootServerType::IbmLccm => 6,
            BootServerType::CaUnicenterTng => 7,
            BootServerType::HpOpenView => 8,
            BootServerType::Other(other) => other,
        }
    }
}

impl BootServerType {
    /// Single byte written into boot server records.
    #[must_use]
    pub fn wire_byte(self) -> u8 {
        u16::from(self).to_le_bytes()[0]
    }
}

/// One boot server as advertised to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEntry {
    /// Ident: 0..=253 for listed servers, [`ServerRegistry::SELF_ID`] for this one.
    pub id: u16,
    pub hostname: String,
    pub boot_file: String,
    pub address: Ipv4Addr,
    pub server_type: BootServerType,
}

impl ServerEntry {
    /// Menu label, `"{hostname} ({address})"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.hostname, self.address)
    }
}

/// Stored form of a boot server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    pub hostname: String,
    pub boot_file: String,
    pub address: Ipv4Addr,
    #[serde(default)]
    pub server_type: BootServerType,
}

/// Store the list of known boot servers is loaded from.
pub trait ServerListSource {
    /// Returns the stored boot servers in their advertised order.
    fn load(&self) -> Result<Vec<ServerRecord>, PxeError>;
}

/// Server list kept as a JSON array of [`ServerRecord`]s.
#[derive(Debug, Clone)]
pub struct JsonServerList {
    path: PathBuf,
}

impl JsonServerList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ServerListSource for JsonServerList {
    fn load(&self) -> Result<Vec<ServerRecord>, PxeError> {
        match fs::read_to_string(&self.path) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Server list {} not found, advertising this server only", self.path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Ordered, read-only list of boot servers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerRegistry {
    entries: Vec<ServerEntry>,
}

impl ServerRegistry {
    /// Ident reserved for this server.
    pub const SELF_ID: u16 = 254;

    /// Number of stored servers read at most (idents 0..=252).
    pub const MAX_STORED: usize = 253;

    /// Builds the registry from stored records and the entry for this server.
    ///
    /// Records get their position as ident. Records repeating an earlier
    /// hostname are skipped, and `self_entry` is only appended if no record
    /// already uses its hostname.
    #[must_use]
    pub fn build(records: Vec<ServerRecord>, self_entry: ServerEntry) -> Self {
        let mut entries: Vec<ServerEntry> = Vec::new();

        for (id, record) in (0u16..).zip(records.into_iter().take(Self::MAX_STORED)) {
            if entries.iter().any(|e| e.hostname == record.hostname) {
                debug!("Skipping duplicate boot server {}", record.hostname);
                continue;
            }
            entries.push(ServerEntry {
                id,
                hostname: record.hostname,
                boot_file: record.boot_file,
                address: record.address,
                server_type: record.server_type,
            });
        }

        if !entries.iter().any(|e| e.hostname == self_entry.hostname) {
            entries.push(self_entry);
        }

        Self { entries }
    }

    /// Loads the stored list from `source` and adds this server as described by `config`.
    pub fn load(source: &dyn ServerListSource, config: &PxeConfig) -> Result<Self, PxeError> {
        Ok(Self::build(source.load()?, Self::self_entry(config)))
    }

    /// The synthetic entry advertising this server.
    #[must_use]
    pub fn self_entry(config: &PxeConfig) -> ServerEntry {
        ServerEntry {
            id: Self::SELF_ID,
            hostname: config.server_name.clone(),
            boot_file: config.wds.default_bootfile.clone(),
            address: config.server_ip,
            server_type: BootServerType::MicrosoftWindowsNt,
        }
    }

    /// Registry over exactly `entries`, in the given order.
    #[must_use]
    pub fn from_entries(entries: Vec<ServerEntry>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[ServerEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, id: u16) -> Option<&ServerEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hostname: &str, last: u8) -> ServerRecord {
        ServerRecord {
            hostname: hostname.to_string(),
            boot_file: "pxelinux.0".to_string(),
            address: Ipv4Addr::new(10, 0, 0, last),
            server_type: BootServerType::PxeBootstrap,
        }
    }

    fn config() -> PxeConfig {
        PxeConfig {
            server_name: "bootpd".to_string(),
            server_ip: Ipv4Addr::new(10, 0, 0, 1),
            ..PxeConfig::default()
        }
    }

    #[test]
    fn test_build_assigns_ids_and_appends_self() {
        let registry = ServerRegistry::build(
            vec![record("alpha", 2), record("beta", 3)],
            ServerRegistry::self_entry(&config()),
        );

        let ids: Vec<u16> = registry.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 1, 254]);
        let me = registry.get(ServerRegistry::SELF_ID).unwrap();
        assert_eq!(me.hostname, "bootpd");
        assert_eq!(me.boot_file, "wdsnbp.0");
        assert_eq!(me.server_type, BootServerType::MicrosoftWindowsNt);
    }

    #[test]
    fn test_build_skips_duplicates_and_existing_self() {
        let registry = ServerRegistry::build(
            vec![record("alpha", 2), record("alpha", 3), record("bootpd", 4)],
            ServerRegistry::self_entry(&config()),
        );

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.entries()[1].id, 2, "Ident follows the stored position");
        assert!(registry.get(ServerRegistry::SELF_ID).is_none());
    }

    #[test]
    fn test_build_reads_at_most_253_records() {
        let records = (0..300).map(|i| record(&format!("srv{i}"), 9)).collect();
        let registry = ServerRegistry::build(records, ServerRegistry::self_entry(&config()));
        assert_eq!(registry.len(), 254);
        assert_eq!(registry.entries()[252].id, 252);
    }

    #[test]
    fn test_server_type_conversions() {
        assert_eq!(BootServerType::from(1), BootServerType::MicrosoftWindowsNt);
        assert_eq!(u16::from(BootServerType::Other(0x8001)), 0x8001);
        assert_eq!(BootServerType::Other(0x8001).wire_byte(), 0x01);
        assert_eq!(BootServerType::HpOpenView.wire_byte(), 8);
    }

    #[test]
    fn test_json_server_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serverlist.json");
        std::fs::write(
            &path,
            r#"[{ "hostname": "wds01", "bootFile": "Boot/x86/wdsnbp.com", "address": "10.0.0.5", "serverType": 1 }]"#,
        )
        .unwrap();

        let records = JsonServerList::new(&path).load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].server_type, BootServerType::MicrosoftWindowsNt);

        let registry = ServerRegistry::load(&JsonServerList::new(&path), &config()).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_missing_server_list_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonServerList::new(dir.path().join("absent.json"));
        assert!(source.load().unwrap().is_empty());
    }
}
