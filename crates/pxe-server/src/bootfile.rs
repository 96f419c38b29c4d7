//! Boot file selection for PXE clients.
//!
//! WDS clients are handed a loader matching their firmware architecture and,
//! once approved, the boot configuration data (BCD) store. Everything else
//! gets the plain `wdsnbp.0` network boot program.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};

use crate::config::WdsPaths;
use crate::fs::FileStore;

/// Client system architecture, DHCP option 93 (RFC 4578).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    /// Intel x86 PC (BIOS).
    X86Bios,
    /// EFI Itanium.
    EfiItanium,
    /// EFI byte code.
    EfiBc,
    /// EFI x86-64.
    EfiX64,
    Other(u16),
}

impl Architecture {
    #[must_use]
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::X86Bios,
            2 => Self::EfiItanium,
            7 => Self::EfiBc,
            9 => Self::EfiX64,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub fn as_u16(self) -> u16 {
        match self {
            Self::X86Bios => 0,
            Self::EfiItanium => 2,
            Self::EfiBc => 7,
            Self::EfiX64 => 9,
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86Bios => write!(f, "x86 BIOS"),
            Self::EfiItanium => write!(f, "EFI Itanium"),
            Self::EfiBc => write!(f, "EFI BC"),
            Self::EfiX64 => write!(f, "EFI x64"),
            Self::Other(code) => write!(f, "unknown ({})", code),
        }
    }
}

/// What the deployment service decided for a pending client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextAction {
    Approval,
    Abort,
}

/// Boot parameters handed to one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootDecision {
    pub architecture: Architecture,
    pub next_action: NextAction,
    /// Loader path relative to the TFTP root.
    pub boot_file: String,
    /// BCD path relative to the TFTP root; empty unless approved.
    pub bcd_path: String,
}

/// A client asking for a boot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootClient {
    pub architecture: Architecture,
    pub next_action: NextAction,
    /// Whether the client talks the WDS protocol (it sent WDS vendor options).
    pub wds: bool,
}

/// Looks up `(boot_file, bcd_path)` for a WDS client.
///
/// Unknown architectures are served like x86. Any action besides
/// [`NextAction::Approval`] yields the abort loader and no BCD.
#[must_use]
pub fn select_boot_file(paths: &WdsPaths, architecture: Architecture, next_action: NextAction) -> (String, String) {
    let (prefix, loader) = match architecture {
        Architecture::X86Bios | Architecture::Other(_) => (&paths.prefix_x86, &paths.bootfile_x86),
        Architecture::EfiItanium => (&paths.prefix_ia64, &paths.bootfile_ia64),
        Architecture::EfiX64 => (&paths.prefix_x64, &paths.bootfile_x64),
        Architecture::EfiBc => (&paths.prefix_efi, &paths.bootfile_efi),
    };

    match next_action {
        NextAction::Approval => (
            join_boot_path(prefix, loader),
            join_boot_path(prefix, &paths.bcd_file_name),
        ),
        NextAction::Abort => (join_boot_path(prefix, &paths.bootfile_abort), String::new()),
    }
}

/// Joins a configured prefix and a file name with exactly one `/`.
fn join_boot_path(prefix: &str, file: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') || prefix.ends_with('\\') {
        format!("{}{}", prefix, file)
    } else {
        format!("{}/{}", prefix, file)
    }
}

/// Picks boot files and checks them against the TFTP root.
pub struct BootFileSelector {
    paths: WdsPaths,
    files: Arc<dyn FileStore>,
}

impl BootFileSelector {
    pub fn new(paths: WdsPaths, files: Arc<dyn FileStore>) -> Self {
        Self { paths, files }
    }

    /// Selects the boot file for `client`.
    ///
    /// Returns `None`, after logging, when the chosen loader does not exist
    /// below the TFTP root. Callers answer without a boot file then.
    pub async fn select(&self, client: &BootClient) -> Option<BootDecision> {
        let (boot_file, bcd_path) = if client.wds {
            select_boot_file(&self.paths, client.architecture, client.next_action)
        } else {
            (
                join_boot_path(&self.paths.prefix_x86, &self.paths.default_bootfile),
                String::new(),
            )
        };

        let present = match self.files.resolve(&boot_file) {
            Ok(path) => self.files.exists(&path).await,
            Err(e) => {
                debug!("Boot file {} rejected: {}", boot_file, e);
                false
            }
        };
        if !present {
            error!("File not found: {}", boot_file);
            return None;
        }

        debug!(
            "Selected {} for {} client ({:?})",
            boot_file, client.architecture, client.next_action
        );
        Some(BootDecision {
            architecture: client.architecture,
            next_action: client.next_action,
            boot_file,
            bcd_path,
        })
    }
}
