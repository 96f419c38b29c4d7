//! ProxyDHCP support for PXE boot.
//!
//! This module does not lease addresses. It builds the PXE vendor options
//! ([`vendor`]) and writes them, with the selected boot file, into a DHCPv4
//! reply that the caller's DHCP server sends.

pub mod vendor;

use std::net::Ipv4Addr;

use dhcproto::v4;
use tracing::debug;

use crate::bootfile::BootDecision;

/// Vendor class that marks a reply as PXE-aware (option 60).
pub const PXE_CLIENT_CLASS: &str = "PXEClient";

/// Stores `payload` as vendor-encapsulated options (option 43) of `message`
/// and tags the reply with the `PXEClient` vendor class.
///
/// # Arguments
/// * `message` - DHCP reply under construction
/// * `payload` - output of [`vendor::generate_server_list`]
pub fn embed_vendor_options(message: &mut v4::Message, payload: Vec<u8>) {
    debug!("Embedding {} bytes of PXE vendor options", payload.len());

    let opts = message.opts_mut();
    opts.insert(v4::DhcpOption::ClassIdentifier(PXE_CLIENT_CLASS.as_bytes().to_vec()));
    opts.insert(v4::DhcpOption::VendorExtensions(payload));
}

/// Points `message` at the boot file of `decision`, served by `server_ip`.
pub fn apply_boot_decision(message: &mut v4::Message, server_ip: Ipv4Addr, decision: &BootDecision) {
    message.set_siaddr(server_ip);
    message.set_fname_str(&decision.boot_file);
}
