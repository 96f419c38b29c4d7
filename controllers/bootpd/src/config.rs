//! Configuration loading.
//!
//! Settings start from the defaults of [`PxeConfig`], are replaced by the
//! JSON file named in `BOOTPD_CONFIG` (if set) and finally overridden by
//! single environment variables. Without a configured server address the
//! address of `BOOTPD_INTERFACE` is advertised.

use std::env;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use pxe_server::config::PxeConfig;
use tracing::debug;

use crate::error::ServiceError;
use crate::interface::get_interface_ip;

pub const CONFIG_FILE: &str = "BOOTPD_CONFIG";
pub const TFTP_ROOT: &str = "BOOTPD_TFTP_ROOT";
pub const SERVER_IP: &str = "BOOTPD_SERVER_IP";
pub const TFTP_PORT: &str = "BOOTPD_TFTP_PORT";
pub const SERVER_LIST: &str = "BOOTPD_SERVER_LIST";
pub const INTERFACE: &str = "BOOTPD_INTERFACE";

/// Loads settings from the process environment.
pub fn from_env() -> Result<PxeConfig, ServiceError> {
    load(|name| env::var(name).ok())
}

/// Loads settings, reading variables through `var`.
pub fn load(var: impl Fn(&str) -> Option<String>) -> Result<PxeConfig, ServiceError> {
    let mut config = match var(CONFIG_FILE) {
        Some(path) => {
            debug!("Reading settings from {}", path);
            let json = std::fs::read_to_string(&path)
                .map_err(|source| ServiceError::ConfigFile { path, source })?;
            PxeConfig::from_json(&json)?
        }
        None => PxeConfig::default(),
    };

    if let Some(root) = var(TFTP_ROOT) {
        config.tftp_root = PathBuf::from(root);
    }
    if let Some(ip) = var(SERVER_IP) {
        config.server_ip = ip.parse::<Ipv4Addr>().map_err(|_| {
            ServiceError::InvalidConfig(format!("{} is not an IPv4 address: {}", SERVER_IP, ip))
        })?;
    }
    if config.server_ip.is_unspecified() {
        if let Some(name) = var(INTERFACE) {
            config.server_ip = get_interface_ip(&name).map_err(|e| {
                ServiceError::InvalidConfig(format!("{} {}: {}", INTERFACE, name, e))
            })?;
            debug!("Using address {} of {}", config.server_ip, name);
        }
    }
    if let Some(port) = var(TFTP_PORT) {
        config.tftp_port = port.parse::<u16>().map_err(|_| {
            ServiceError::InvalidConfig(format!("{} is not a port: {}", TFTP_PORT, port))
        })?;
    }
    if let Some(list) = var(SERVER_LIST) {
        config.server_list = PathBuf::from(list);
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_need_server_address() {
        assert!(matches!(load(vars(&[])), Err(ServiceError::Pxe(_))));

        let config = load(vars(&[(SERVER_IP, "10.0.0.1")])).unwrap();
        assert_eq!(config.tftp_port, 69);
        assert_eq!(config.tftp_root, PathBuf::from("TFTPRoot"));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_server_address_from_interface() {
        let config = load(vars(&[(INTERFACE, "lo")])).unwrap();
        assert!(config.server_ip.is_loopback());

        let config = load(vars(&[(INTERFACE, "lo"), (SERVER_IP, "10.0.0.1")])).unwrap();
        assert_eq!(config.server_ip, Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn test_unknown_interface_is_invalid() {
        assert!(matches!(
            load(vars(&[(INTERFACE, "no-such-if0")])),
            Err(ServiceError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_environment_overrides() {
        let config = load(vars(&[
            (TFTP_ROOT, "/srv/tftp"),
            (SERVER_IP, "192.168.10.5"),
            (TFTP_PORT, "6969"),
            (SERVER_LIST, "/etc/bootpd/servers.json"),
        ]))
        .unwrap();

        assert_eq!(config.tftp_root, PathBuf::from("/srv/tftp"));
        assert_eq!(config.server_ip, Ipv4Addr::new(192, 168, 10, 5));
        assert_eq!(config.tftp_port, 6969);
        assert_eq!(config.server_list, PathBuf::from("/etc/bootpd/servers.json"));
    }

    #[test]
    fn test_file_then_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bootpd.json");
        std::fs::write(&path, r#"{ "serverIp": "10.0.0.1", "tftpPort": 1069, "menuPrompt": "Boot menu" }"#).unwrap();
        let path = path.to_string_lossy().to_string();

        let config = load(vars(&[(CONFIG_FILE, path.as_str())])).unwrap();
        assert_eq!(config.tftp_port, 1069);
        assert_eq!(config.menu_prompt, "Boot menu");

        let config = load(vars(&[(CONFIG_FILE, path.as_str()), (TFTP_PORT, "2069")])).unwrap();
        assert_eq!(config.tftp_port, 2069);
        assert_eq!(config.menu_prompt, "Boot menu");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(vars(&[(SERVER_IP, "fe80::1")])),
            Err(ServiceError::InvalidConfig(_))
        ));
        assert!(matches!(
            load(vars(&[(TFTP_PORT, "70000")])),
            Err(ServiceError::InvalidConfig(_))
        ));
        assert!(matches!(
            load(vars(&[(CONFIG_FILE, "/nonexistent/bootpd.json")])),
            Err(ServiceError::ConfigFile { .. })
        ));
    }
}
