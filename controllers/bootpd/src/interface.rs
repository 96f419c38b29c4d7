//! Address lookup for the interface the daemon serves on.

use std::io::{Error, ErrorKind, Result};
use std::net::Ipv4Addr;

/// First IPv4 address of the interface called `name`.
#[cfg(unix)]
pub fn get_interface_ip(name: &str) -> Result<Ipv4Addr> {
    nix::ifaddrs::getifaddrs()?
        .find_map(|ifa| {
            if ifa.interface_name != name {
                return None;
            }
            ifa.address.and_then(|addr| addr.as_sockaddr_in().map(|sin| sin.ip()))
        })
        .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("no IPv4 address on {}", name)))
}

#[cfg(not(unix))]
pub fn get_interface_ip(name: &str) -> Result<Ipv4Addr> {
    Err(Error::new(
        ErrorKind::Unsupported,
        format!("interface lookup of {} is not supported on this platform", name),
    ))
}
