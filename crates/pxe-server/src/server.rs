//! Main PXE server implementation.
//!
//! This module ties the settings, the boot server registry and the TFTP
//! listener together. The DHCP side is served through
//! [`PxeServer::prepare_reply`], which fills in the PXE parts of a reply
//! built by the caller's DHCP server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use dhcproto::v4;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::bootfile::{BootClient, BootDecision, BootFileSelector};
use crate::config::PxeConfig;
use crate::dhcp::{self, vendor};
use crate::error::PxeError;
use crate::fs::LocalFileStore;
use crate::registry::ServerRegistry;
use crate::tftp::TftpServer;

/// PXE boot server.
///
/// Coordinates the PXE vendor options, the boot file selection and the
/// TFTP service that delivers the selected files.
pub struct PxeServer {
    config: PxeConfig,
    registry: ServerRegistry,
    files: Arc<LocalFileStore>,
    selector: BootFileSelector,
    shutdown: watch::Sender<bool>,
}

impl PxeServer {
    /// Creates a new PXE server instance.
    ///
    /// # Arguments
    /// * `config` - validated before use
    /// * `registry` - boot servers advertised to clients
    pub fn new(config: PxeConfig, registry: ServerRegistry) -> Result<Self, PxeError> {
        config.validate()?;

        let files = Arc::new(LocalFileStore::new(config.tftp_root.clone(), config.read_buffer));
        let selector = BootFileSelector::new(config.wds.clone(), files.clone());
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            registry,
            files,
            selector,
            shutdown,
        })
    }

    pub fn config(&self) -> &PxeConfig {
        &self.config
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// Option 43 payload for a client; `item` is the menu item it picked, or 0.
    pub fn vendor_options(&self, item: u16) -> Vec<u8> {
        vendor::generate_server_list(&self.registry, self.config.server_ip, &self.config.menu_prompt, item)
    }

    /// Selects and checks the boot file for `client`.
    pub async fn select_boot_file(&self, client: &BootClient) -> Option<BootDecision> {
        self.selector.select(client).await
    }

    /// Adds the PXE options and, when one is available, the boot file to
    /// `message`.
    ///
    /// Returns the boot decision written into the reply. `None` leaves the
    /// boot file unset; the reply is still usable for the boot menu.
    pub async fn prepare_reply(
        &self,
        message: &mut v4::Message,
        item: u16,
        client: &BootClient,
    ) -> Option<BootDecision> {
        dhcp::embed_vendor_options(message, self.vendor_options(item));

        let decision = self.select_boot_file(client).await;
        match &decision {
            Some(decision) => dhcp::apply_boot_decision(message, self.config.server_ip, decision),
            None => warn!("Replying without boot file ({} client)", client.architecture),
        }
        decision
    }

    /// Starts the PXE server.
    ///
    /// Serves TFTP until [`PxeServer::shutdown`] is called.
    pub async fn start(&self) -> Result<()> {
        info!(
            "Starting PXE boot server {} with {} boot servers",
            self.config.server_name,
            self.registry.len()
        );

        self.files.ensure_root().await?;
        let bind = SocketAddr::from((self.config.server_ip, self.config.tftp_port));
        let tftp = TftpServer::bind(bind, self.files.clone(), self.config.default_block_size).await?;

        tftp.start(self.shutdown.subscribe()).await
    }

    /// Shuts down the PXE server gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down PXE boot server");
        self.shutdown.send_replace(true);
        Ok(())
    }
}
