//! bootpd
//!
//! PXE boot daemon for Windows Deployment Services style network boot.
//!
//! Loads its settings and the boot server list, then serves boot files over
//! TFTP until interrupted.

mod config;
mod error;
mod interface;

use std::sync::Arc;

use anyhow::Result;
use pxe_server::PxeServer;
use pxe_server::registry::{JsonServerList, ServerRegistry};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting bootpd");

    let config = config::from_env()?;

    info!("Configuration:");
    info!("  Server: {} ({})", config.server_name, config.server_ip);
    info!("  TFTP root: {}", config.tftp_root.display());
    info!("  TFTP port: {}", config.tftp_port);
    info!("  Server list: {}", config.server_list.display());

    let registry = ServerRegistry::load(&JsonServerList::new(config.server_list.clone()), &config)?;
    info!("Loaded {} boot servers", registry.len());

    let server = Arc::new(PxeServer::new(config, registry)?);

    let signal_server = Arc::clone(&server);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for interrupt: {}", e);
            return;
        }
        info!("Interrupt received");
        if let Err(e) = signal_server.shutdown().await {
            error!("Shutdown failed: {}", e);
        }
    });

    server.start().await?;

    Ok(())
}
