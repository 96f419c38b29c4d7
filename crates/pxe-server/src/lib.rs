//! PXE Boot Server
//!
//! Rust PXE boot server core for Windows Deployment Services style network
//! boot, built on `dhcproto` and `tokio`.
//!
//! This crate provides:
//! - PXE vendor options (DHCP option 43): boot server list, boot menu and
//!   menu prompt, embedded into a `dhcproto` reply
//! - Boot file selection per client architecture and approval state
//! - TFTP server for boot file delivery with `blksize`/`tsize` negotiation (IPv4)
//! - NTLM negotiation flag decoding
//!
//! # Collaborators
//!
//! The TFTP engine talks to the network through [`tftp::Transport`] and to
//! the boot image tree through [`fs::FileStore`]. The boot server list is
//! read through [`registry::ServerListSource`]. In-memory doubles live in
//! `mock` behind the `test-util` feature.

pub mod bootfile;
pub mod codec;
pub mod config;
pub mod dhcp;
pub mod error;
pub mod fs;
pub mod ntlm;
pub mod registry;
pub mod server;
pub mod tftp;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use server::*;
pub use error::*;
