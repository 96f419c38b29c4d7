//! NTLM negotiation flags (MS-NLMP 2.2.2.5).

use bitflags::bitflags;

bitflags! {
    /// Raw `NegotiateFlags` of an NTLM NEGOTIATE/CHALLENGE/AUTHENTICATE message.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct NegotiateFlags: u32 {
        const UNICODE = 1 << 0;
        const OEM = 1 << 1;
        const REQUEST_TARGET = 1 << 2;
        const SIGN = 1 << 4;
        const SEAL = 1 << 5;
        const DATAGRAM = 1 << 6;
        const LM_KEY = 1 << 7;
        const NTLM = 1 << 9;
        const ANONYMOUS = 1 << 11;
        const OEM_DOMAIN_SUPPLIED = 1 << 12;
        const OEM_WORKSTATION_SUPPLIED = 1 << 13;
        const ALWAYS_SIGN = 1 << 15;
        const TARGET_TYPE_DOMAIN = 1 << 16;
        const TARGET_TYPE_SERVER = 1 << 17;
        const EXTENDED_SESSION_SECURITY = 1 << 19;
        const IDENTIFY = 1 << 20;
        const REQUEST_NON_NT_SESSION_KEY = 1 << 22;
        const TARGET_INFO = 1 << 23;
        const VERSION = 1 << 25;
        const NEGOTIATE_128 = 1 << 29;
        const KEY_EXCH = 1 << 30;
        const NEGOTIATE_56 = 1 << 31;
    }
}

/// Capabilities a peer negotiated, one flag per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NegotiatedCapabilities {
    pub request_target: bool,
    pub oem: bool,
    pub unicode: bool,
    pub seal: bool,
    pub sign: bool,
    pub always_sign: bool,
    pub domain_supplied: bool,
    pub workstation_supplied: bool,
    pub lm_key: bool,
    pub key_exchange: bool,
    pub target_type_domain: bool,
    pub target_type_server: bool,
    pub extended_session_security: bool,
    pub ntlm: bool,
    pub negotiate_56: bool,
    pub negotiate_128: bool,
}

/// Decodes a raw flag word. Unknown bits are ignored.
///
/// Either key strength bit sets both `negotiate_56` and `negotiate_128`.
/// `ntlm` is cleared whenever extended session security is negotiated.
#[must_use]
pub fn decode_flags(bits: u32) -> NegotiatedCapabilities {
    let flags = NegotiateFlags::from_bits_truncate(bits);
    let strength = flags.intersects(NegotiateFlags::NEGOTIATE_128 | NegotiateFlags::NEGOTIATE_56);
    let ess = flags.contains(NegotiateFlags::EXTENDED_SESSION_SECURITY);

    NegotiatedCapabilities {
        request_target: flags.contains(NegotiateFlags::REQUEST_TARGET),
        oem: flags.contains(NegotiateFlags::OEM),
        unicode: flags.contains(NegotiateFlags::UNICODE),
        seal: flags.contains(NegotiateFlags::SEAL),
        sign: flags.contains(NegotiateFlags::SIGN),
        always_sign: flags.contains(NegotiateFlags::ALWAYS_SIGN),
        domain_supplied: flags.contains(NegotiateFlags::OEM_DOMAIN_SUPPLIED),
        workstation_supplied: flags.contains(NegotiateFlags::OEM_WORKSTATION_SUPPLIED),
        lm_key: flags.contains(NegotiateFlags::LM_KEY),
        key_exchange: flags.contains(NegotiateFlags::KEY_EXCH),
        target_type_domain: flags.contains(NegotiateFlags::TARGET_TYPE_DOMAIN),
        target_type_server: flags.contains(NegotiateFlags::TARGET_TYPE_SERVER),
        extended_session_security: ess,
        ntlm: flags.contains(NegotiateFlags::NTLM) && !ess,
        negotiate_56: strength,
        negotiate_128: strength,
    }
}
