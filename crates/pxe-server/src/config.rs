//! Server settings.
//!
//! Every field has a default, so a settings file only needs to name what
//! it changes.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::PxeError;

/// Settings of the boot server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PxeConfig {
    /// Name advertised for the synthetic self-entry of the server registry.
    pub server_name: String,
    /// Address advertised in boot server records and DHCP replies.
    pub server_ip: Ipv4Addr,
    pub tftp_root: PathBuf,
    pub tftp_port: u16,
    /// Capacity of the buffered reader used for boot files.
    pub read_buffer: usize,
    /// TFTP block size when the client does not negotiate one.
    pub default_block_size: usize,
    /// JSON file listing the known boot servers.
    pub server_list: PathBuf,
    /// Text shown by the PXE ROM above the boot menu.
    pub menu_prompt: String,
    pub wds: WdsPaths,
}

impl Default for PxeConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            server_ip: Ipv4Addr::UNSPECIFIED,
            tftp_root: PathBuf::from("TFTPRoot"),
            tftp_port: 69,
            read_buffer: 65536,
            default_block_size: 512,
            server_list: PathBuf::from("serverlist.json"),
            menu_prompt: "This server includes a list in its response. Choose the desired one!"
                .to_string(),
            wds: WdsPaths::default(),
        }
    }
}

fn default_server_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "bootpd".to_string())
}

impl PxeConfig {
    /// Parses settings from JSON.
    pub fn from_json(json: &str) -> Result<Self, PxeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<(), PxeError> {
        if self.default_block_size < 8 || self.default_block_size > 65464 {
            return Err(PxeError::Configuration(format!(
                "defaultBlockSize must be within 8..=65464, got {}",
                self.default_block_size
            )));
        }
        if self.read_buffer == 0 {
            return Err(PxeError::Configuration("readBuffer must not be 0".to_string()));
        }
        if self.server_ip.is_unspecified() {
            return Err(PxeError::Configuration(
                "serverIp must be set, clients are pointed at it".to_string(),
            ));
        }
        if self.server_name.is_empty() {
            return Err(PxeError::Configuration("serverName must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Boot loader layout of a Windows Deployment Services tree below the TFTP root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WdsPaths {
    pub bcd_file_name: String,
    pub prefix_x86: String,
    pub prefix_x64: String,
    pub prefix_efi: String,
    pub prefix_ia64: String,
    pub bootfile_x86: String,
    pub bootfile_x64: String,
    pub bootfile_ia64: String,
    pub bootfile_efi: String,
    pub bootfile_abort: String,
    /// Boot file handed to plain PXE clients and the self-entry of the registry.
    pub default_bootfile: String,
}

impl Default for WdsPaths {
    fn default() -> Self {
        Self {
            bcd_file_name: "default.bcd".to_string(),
            prefix_x86: "Boot/x86/".to_string(),
            prefix_x64: "Boot/x64/".to_string(),
            prefix_efi: "Boot/EFI/".to_string(),
            prefix_ia64: "Boot/ia64/".to_string(),
            bootfile_x86: "pxeboot.n12".to_string(),
            bootfile_x64: "pxeboot.n12".to_string(),
            bootfile_ia64: "Bootmgfw.efi".to_string(),
            bootfile_efi: "Bootmgfw.efi".to_string(),
            bootfile_abort: "abortpxe.com".to_string(),
            default_bootfile: "wdsnbp.0".to_string(),
        }
    }
}
