//! PXE vendor-encapsulated options (DHCP option 43).
//!
//! Every sub-option is `[tag, length, body]`. The functions here are pure;
//! oversized input (long prompts, long server names, large registries) is
//! truncated so that the block is always sendable, never rejected.
//!
//! Idents are written little-endian, the boot item id as a 32-bit
//! little-endian value.

use std::net::Ipv4Addr;

use crate::codec::{ascii_bytes, put_bounded, put_u16_le, put_u32_le};
use crate::registry::{ServerEntry, ServerRegistry};

/// PXE sub-option tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VendorOption {
    DiscoveryControl = 6,
    BootServers = 8,
    BootMenu = 9,
    MenuPrompt = 10,
    BootItem = 71,
}

/// Discovery control bit 1: disable multicast discovery, use the server list.
pub const DISCOVERY_UNICAST_ONLY: u8 = 2;

/// Registry entries considered for the menu and the server list.
pub const MAX_ENTRIES: usize = 256;

/// Longest menu label, in bytes.
pub const MAX_NAME_LEN: usize = 128;

/// Longest menu prompt, in characters.
pub const MAX_PROMPT_LEN: usize = 250;

/// Prompt timeout byte; 255 waits for the user.
pub const PROMPT_TIMEOUT: u8 = u8::MAX;

const MAX_BODY_LEN: usize = u8::MAX as usize;
const BOOT_SERVER_RECORD_LEN: usize = 7;

/// Wraps `data` as `[tag, len, data]`. Data past 255 bytes is dropped.
#[must_use]
pub fn encapsulate(tag: u8, data: &[u8]) -> Vec<u8> {
    let len = data.len().min(MAX_BODY_LEN);
    let mut out = Vec::with_capacity(len + 2);
    out.push(tag);
    out.push(len as u8);
    put_bounded(&mut out, data, len);
    out
}

/// `[6, 1, 2]`
#[must_use]
pub fn discovery_control() -> Vec<u8> {
    encapsulate(VendorOption::DiscoveryControl as u8, &[DISCOVERY_UNICAST_ONLY])
}

/// `[10, len + 1, 255, message]`, with `message` cut to 250 ASCII characters.
#[must_use]
pub fn menu_prompt(message: &str) -> Vec<u8> {
    let truncated: String = message.chars().take(MAX_PROMPT_LEN).collect();

    let mut body = vec![PROMPT_TIMEOUT];
    body.extend_from_slice(&ascii_bytes(&truncated));
    encapsulate(VendorOption::MenuPrompt as u8, &body)
}

/// `[9, len, { ident, name len, name }*]` over the first 256 entries.
///
/// Names are `"{hostname} ({address})"` cut to 128 bytes. Entries stop once
/// the next one would overflow the length byte.
#[must_use]
pub fn boot_menu(entries: &[ServerEntry]) -> Vec<u8> {
    let mut body = Vec::new();

    for entry in entries.iter().take(MAX_ENTRIES) {
        let name = ascii_bytes(&entry.display_name());
        let name_len = name.len().min(MAX_NAME_LEN);
        if body.len() + 3 + name_len > MAX_BODY_LEN {
            break;
        }

        put_u16_le(&mut body, entry.id);
        body.push(name_len as u8);
        put_bounded(&mut body, &name, name_len);
    }

    encapsulate(VendorOption::BootMenu as u8, &body)
}

/// `[8, 7 * n, { ident, type, server_ip }*]` over the first 256 entries.
///
/// Every record advertises `server_ip`, this server, whatever the entry's own
/// address is. Records stop once the length byte is full (36 records).
#[must_use]
pub fn boot_servers(entries: &[ServerEntry], server_ip: Ipv4Addr) -> Vec<u8> {
    let mut body = Vec::new();

    for entry in entries
        .iter()
        .take(MAX_ENTRIES)
        .take(MAX_BODY_LEN / BOOT_SERVER_RECORD_LEN)
    {
        put_u16_le(&mut body, entry.id);
        body.push(entry.server_type.wire_byte());
        body.extend_from_slice(&server_ip.octets());
    }

    encapsulate(VendorOption::BootServers as u8, &body)
}

/// `[71, 4, item as u32 LE]`, naming the menu item a client picked.
#[must_use]
pub fn boot_item(item: u16) -> Vec<u8> {
    let mut body = Vec::with_capacity(4);
    put_u32_le(&mut body, u32::from(item));
    encapsulate(VendorOption::BootItem as u8, &body)
}

/// Builds the option 43 payload.
///
/// With `item == 0` this is discovery control, boot servers, menu prompt and
/// boot menu, concatenated in that order. Any other `item` yields only the
/// boot item selection.
#[must_use]
pub fn generate_server_list(registry: &ServerRegistry, server_ip: Ipv4Addr, prompt: &str, item: u16) -> Vec<u8> {
    if item != 0 {
        return boot_item(item);
    }

    let entries = registry.entries();
    [
        discovery_control(),
        boot_servers(entries, server_ip),
        menu_prompt(prompt),
        boot_menu(entries),
    ]
    .concat()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BootServerType;

    const SERVER_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

    fn entry(id: u16, hostname: &str, last: u8) -> ServerEntry {
        ServerEntry {
            id,
            hostname: hostname.to_string(),
            boot_file: "wdsnbp.0".to_string(),
            address: Ipv4Addr::new(10, 0, 0, last),
            server_type: BootServerType::MicrosoftWindowsNt,
        }
    }

    #[test]
    fn test_discovery_control() {
        assert_eq!(discovery_control(), vec![6, 1, 2]);
    }

    #[test]
    fn test_boot_servers_two_entries() {
        let entries = [entry(0, "alpha", 2), entry(254, "self", 1)];
        let option = boot_servers(&entries, SERVER_IP);

        assert_eq!(option.len(), 16);
        assert_eq!(option[0], 8);
        assert_eq!(option[1], 14);
        assert_eq!(&option[2..9], &[0, 0, 1, 10, 0, 0, 1]);
        assert_eq!(&option[9..16], &[254, 0, 1, 10, 0, 0, 1]);
    }

    #[test]
    fn test_boot_servers_advertise_own_address() {
        let option = boot_servers(&[entry(3, "remote", 99)], SERVER_IP);
        assert_eq!(&option[5..9], &SERVER_IP.octets());
    }

    #[test]
    fn test_boot_servers_cap_at_length_byte() {
        let entries: Vec<ServerEntry> = (0..300).map(|i| entry(i, "srv", 2)).collect();
        let option = boot_servers(&entries, SERVER_IP);
        assert_eq!(option[1] as usize, 36 * 7);
        assert_eq!(option.len(), 2 + 36 * 7);
    }

    #[test]
    fn test_menu_prompt_truncates_255_chars_to_250() {
        let option = menu_prompt(&"x".repeat(255));
        assert_eq!(option[0], 10);
        assert_eq!(option[1], 251);
        assert_eq!(option[2], 255);
        assert_eq!(option.len(), 2 + 251);
    }

    #[test]
    fn test_menu_prompt_short_message() {
        assert_eq!(menu_prompt("Hi"), vec![10, 3, 255, b'H', b'i']);
        assert_eq!(menu_prompt(""), vec![10, 1, 255]);
        assert_eq!(menu_prompt(&"y".repeat(252))[1], 251);
    }

    #[test]
    fn test_boot_menu_entries() {
        let option = boot_menu(&[entry(1, "wds", 5)]);
        let name = b"wds (10.0.0.5)";

        assert_eq!(option[0], 9);
        assert_eq!(option[1] as usize, 3 + name.len());
        assert_eq!(&option[2..4], &[1, 0]);
        assert_eq!(option[4] as usize, name.len());
        assert_eq!(&option[5..], name);
    }

    #[test]
    fn test_boot_menu_truncates_long_names() {
        let option = boot_menu(&[entry(7, &"h".repeat(200), 5)]);
        assert_eq!(option[4], 128);
        assert_eq!(option.len(), 2 + 3 + 128);
        assert_eq!(option[1] as usize, 3 + 128);
    }

    #[test]
    fn test_boot_menu_stops_before_overflow() {
        let entries: Vec<ServerEntry> = (0..300).map(|i| entry(i, &"n".repeat(100), 5)).collect();
        let option = boot_menu(&entries);
        // 111 byte names, 114 byte entries: two fit in 255
        assert_eq!(option[1], 228);
        assert_eq!(option.len(), 230);
    }

    #[test]
    fn test_boot_item() {
        assert_eq!(boot_item(0x0102), vec![71, 4, 0x02, 0x01, 0, 0]);
    }

    #[test]
    fn test_encapsulate_truncates_body() {
        let option = encapsulate(43, &[1u8; 300]);
        assert_eq!(option[1], 255);
        assert_eq!(option.len(), 257);
    }

    #[test]
    fn test_generate_server_list_layout() {
        let registry = ServerRegistry::from_entries(vec![entry(0, "a", 2), entry(254, "b", 1)]);
        let block = generate_server_list(&registry, SERVER_IP, "Pick", 0);

        let servers = boot_servers(registry.entries(), SERVER_IP);
        let prompt = menu_prompt("Pick");
        let menu = boot_menu(registry.entries());
        assert_eq!(block.len(), 3 + servers.len() + prompt.len() + menu.len());

        assert_eq!(&block[..3], &[6, 1, 2]);
        assert_eq!(&block[3..3 + servers.len()], servers.as_slice());
        let prompt_at = 3 + servers.len();
        assert_eq!(&block[prompt_at..prompt_at + prompt.len()], prompt.as_slice());
        assert_eq!(&block[prompt_at + prompt.len()..], menu.as_slice());
    }

    #[test]
    fn test_generate_server_list_item_selection() {
        let registry = ServerRegistry::from_entries(vec![entry(0, "a", 2)]);
        assert_eq!(generate_server_list(&registry, SERVER_IP, "Pick", 254), boot_item(254));
    }

    #[test]
    fn test_generate_server_list_empty_registry() {
        let block = generate_server_list(&ServerRegistry::default(), SERVER_IP, "", 0);
        assert_eq!(block, vec![6, 1, 2, 8, 0, 10, 1, 255, 9, 0]);
    }
}
