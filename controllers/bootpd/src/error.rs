//! Service-specific error types.
//!
//! This module defines error types of the boot daemon that are not covered
//! by the `pxe-server` library errors.

use pxe_server::PxeError;
use thiserror::Error;

/// Errors that can occur while starting bootpd.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Boot server library error
    #[error("PXE server error: {0}")]
    Pxe(#[from] PxeError),

    /// Settings file could not be read
    #[error("Failed to read {path}: {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
