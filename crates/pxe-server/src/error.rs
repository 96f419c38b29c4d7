//! PXE server errors

use std::io;

use thiserror::Error;

use crate::tftp::packet::ErrorCode;

#[derive(Debug, Error)]
pub enum PxeError {
    #[error("TFTP error: {0}")]
    Tftp(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Bounds(#[from] BoundsError),
}

/// A copy touched bytes outside of its source or destination buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("copy of {length} bytes out of bounds (src {src_offset}/{src_len}, dst {dst_offset}/{dst_len})")]
pub struct BoundsError {
    pub src_offset: usize,
    pub src_len: usize,
    pub dst_offset: usize,
    pub dst_len: usize,
    pub length: usize,
}

/// Failure of a single TFTP exchange.
///
/// Every variant maps onto the error code that is put on the wire when the
/// engine answers the client, see [`TransferError::code`].
#[derive(Debug, Error)]
pub enum TransferError {
    /// Transfer mode other than `octet`.
    #[error("Invalid Option: unsupported transfer mode '{0}'")]
    UnsupportedMode(String),

    /// Opcode the server does not accept as a request.
    #[error("Unknown OPCode: {0}")]
    IllegalOperation(u16),

    /// Requested file is empty or missing below the TFTP root.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Requested path escapes the TFTP root.
    #[error("Access violation: {0}")]
    AccessViolation(String),

    /// Datagram could not be decoded.
    #[error("Malformed packet: {0}")]
    Malformed(String),

    /// The client aborted the transfer with its own ERR packet.
    #[error("Client error {code}: {message}")]
    ClientOriginated { code: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Bounds(#[from] BoundsError),
}

impl TransferError {
    /// TFTP error code sent to the peer for this failure.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedMode(_) => ErrorCode::OptionNegotiationFailed,
            Self::IllegalOperation(_) | Self::Malformed(_) => ErrorCode::IllegalOperation,
            Self::NotFound(_) => ErrorCode::FileNotFound,
            Self::AccessViolation(_) => ErrorCode::AccessViolation,
            Self::ClientOriginated { code, .. } => ErrorCode::from_u16(*code),
            Self::Io(_) | Self::Bounds(_) => ErrorCode::NotDefined,
        }
    }
}

impl From<TransferError> for PxeError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Io(e) => Self::Io(e),
            TransferError::Bounds(e) => Self::Bounds(e),
            other => Self::Tftp(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_keeps_its_code() {
        let err = TransferError::ClientOriginated {
            code: 3,
            message: "disk full".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::DiskFull);
        assert_eq!(err.to_string(), "Client error 3: disk full");

        let unknown = TransferError::ClientOriginated {
            code: 99,
            message: String::new(),
        };
        assert_eq!(unknown.code(), ErrorCode::NotDefined);
    }

    #[test]
    fn test_transfer_error_codes() {
        assert_eq!(TransferError::UnsupportedMode("mail".to_string()).code().as_u16(), 8);
        assert_eq!(TransferError::IllegalOperation(2).code().as_u16(), 4);
        assert_eq!(TransferError::AccessViolation("..".to_string()).code().as_u16(), 2);

        let not_found = TransferError::NotFound("boot.bin".to_string());
        assert_eq!(not_found.code(), ErrorCode::FileNotFound);
        assert_eq!(not_found.to_string(), "File not found: boot.bin");
    }

    #[test]
    fn test_into_pxe_error() {
        let io = TransferError::Io(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(matches!(PxeError::from(io), PxeError::Io(_)));
        assert!(matches!(
            PxeError::from(TransferError::IllegalOperation(2)),
            PxeError::Tftp(_)
        ));
    }
}
