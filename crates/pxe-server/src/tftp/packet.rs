//! TFTP wire format.
//!
//! Inbound datagrams are decoded into [`Packet`], borrowing from the receive
//! buffer. Outbound packets are described by [`Reply`] and encoded into an
//! exactly-sized buffer with the [`copy_into`] primitive.
//!
//! All multi-byte fields are big-endian (RFC 1350).

use std::fmt;

use crate::codec::copy_into;
use crate::error::{BoundsError, TransferError};

/// TFTP opcodes (RFC 1350, RFC 2347).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Read request, `| 1 | filename | 0 | mode | 0 | [opt | 0 | value | 0]* |`
    ReadRequest = 1,
    /// Write request. Not served.
    WriteRequest = 2,
    /// `| 3 | block# | data |`
    Data = 3,
    /// `| 4 | block# |`
    Ack = 4,
    /// `| 5 | error code | message | 0 |`
    Error = 5,
    /// `| 6 | opt | 0 | value | 0 | ... |`
    OptionAck = 6,
}

impl Opcode {
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::ReadRequest),
            2 => Some(Self::WriteRequest),
            3 => Some(Self::Data),
            4 => Some(Self::Ack),
            5 => Some(Self::Error),
            6 => Some(Self::OptionAck),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadRequest => "RRQ",
            Self::WriteRequest => "WRQ",
            Self::Data => "DATA",
            Self::Ack => "ACK",
            Self::Error => "ERR",
            Self::OptionAck => "OACK",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// TFTP error codes carried in ERR packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotDefined = 0,
    FileNotFound = 1,
    AccessViolation = 2,
    DiskFull = 3,
    IllegalOperation = 4,
    UnknownTransferId = 5,
    FileAlreadyExists = 6,
    NoSuchUser = 7,
    /// RFC 2347 option negotiation failure, also used for unsupported modes.
    OptionNegotiationFailed = 8,
}

impl ErrorCode {
    /// Maps a wire value to a code; unknown values collapse to `NotDefined`.
    #[must_use]
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::FileNotFound,
            2 => Self::AccessViolation,
            3 => Self::DiskFull,
            4 => Self::IllegalOperation,
            5 => Self::UnknownTransferId,
            6 => Self::FileAlreadyExists,
            7 => Self::NoSuchUser,
            8 => Self::OptionNegotiationFailed,
            _ => Self::NotDefined,
        }
    }

    #[must_use]
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Decoded inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet<'a> {
    /// Body of a read request, everything after the opcode.
    ReadRequest(&'a [u8]),
    Ack(u16),
    Error { code: u16, message: String },
    /// Any other opcode, known or not. Answered with an illegal-operation error.
    Unsupported(u16),
}

impl<'a> Packet<'a> {
    /// Decodes one datagram.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Malformed`] when the datagram is too short to
    /// carry an opcode or the fixed fields of its packet type.
    pub fn decode(buf: &'a [u8]) -> Result<Self, TransferError> {
        let opcode = read_u16(buf, 0)
            .ok_or_else(|| TransferError::Malformed(format!("{} byte datagram", buf.len())))?;

        match Opcode::from_u16(opcode) {
            Some(Opcode::ReadRequest) => Ok(Self::ReadRequest(&buf[2..])),
            Some(Opcode::Ack) => read_u16(buf, 2)
                .map(Self::Ack)
                .ok_or_else(|| TransferError::Malformed("ACK without block number".to_string())),
            Some(Opcode::Error) => {
                let code = read_u16(buf, 2)
                    .ok_or_else(|| TransferError::Malformed("ERR without error code".to_string()))?;
                let raw = &buf[4..];
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                Ok(Self::Error {
                    code,
                    message: String::from_utf8_lossy(&raw[..end]).into_owned(),
                })
            }
            _ => Ok(Self::Unsupported(opcode)),
        }
    }
}

fn read_u16(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Outbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<'a> {
    Data { block: u16, payload: &'a [u8] },
    Error { code: ErrorCode, message: &'a str },
    /// Accepted options in the order they are written.
    OptionAck(&'a [(&'a str, String)]),
}

impl Reply<'_> {
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Data { .. } => Opcode::Data,
            Self::Error { .. } => Opcode::Error,
            Self::OptionAck(_) => Opcode::OptionAck,
        }
    }

    /// Exact number of bytes [`Reply::encode_into`] writes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        2 + match self {
            Self::Data { payload, .. } => 2 + payload.len(),
            Self::Error { message, .. } => 2 + message.len() + 1,
            Self::OptionAck(options) => options
                .iter()
                .map(|(key, value)| key.len() + 1 + value.len() + 1)
                .sum(),
        }
    }

    /// Writes the packet to the front of `buf` and returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError`] when `buf` is shorter than [`Reply::encoded_len`].
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, BoundsError> {
        let mut offset = copy_into(&(self.opcode() as u16).to_be_bytes(), 0, buf, 0, 2)?;

        match self {
            Self::Data { block, payload } => {
                offset += copy_into(&block.to_be_bytes(), 0, buf, offset, 2)?;
                offset += copy_into(payload, 0, buf, offset, payload.len())?;
            }
            Self::Error { code, message } => {
                offset += copy_into(&code.as_u16().to_be_bytes(), 0, buf, offset, 2)?;
                offset += copy_into(message.as_bytes(), 0, buf, offset, message.len())?;
                offset += copy_into(&[0], 0, buf, offset, 1)?;
            }
            Self::OptionAck(options) => {
                for (key, value) in *options {
                    offset += copy_into(key.as_bytes(), 0, buf, offset, key.len())?;
                    offset += copy_into(&[0], 0, buf, offset, 1)?;
                    offset += copy_into(value.as_bytes(), 0, buf, offset, value.len())?;
                    offset += copy_into(&[0], 0, buf, offset, 1)?;
                }
            }
        }

        Ok(offset)
    }

    /// Encodes into a freshly allocated, exactly-sized buffer.
    ///
    /// # Errors
    ///
    /// Propagates [`BoundsError`] from [`Reply::encode_into`].
    pub fn to_bytes(&self) -> Result<Vec<u8>, BoundsError> {
        let mut buf = vec![0u8; self.encoded_len()];
        let written = self.encode_into(&mut buf)?;
        buf.truncate(written);
        Ok(buf)
    }
}
