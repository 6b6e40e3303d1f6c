//! IPv4 access control policy: allow/deny by literal address or CIDR range.

use serde::{Deserialize, Serialize};

/// Access control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    #[default]
    Disabled,
    Whitelist,
    Blacklist,
}

/// One entry: a literal IPv4 address or a CIDR range `a.b.c.d/n`.
pub type AccessEntry = String;

/// `disabled` permits all; `whitelist` with an empty set permits all;
/// `blacklist` with an empty set permits all.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccessPolicy {
    pub mode: AccessMode,
    pub whitelist: Vec<AccessEntry>,
    pub blacklist: Vec<AccessEntry>,
}

impl AccessPolicy {
    /// Normalize a socket-observed address the way the gateway does before
    /// matching: strip an `::ffff:` v4-mapped prefix, map `::1` to loopback.
    #[must_use]
    pub fn normalize_ip(raw: &str) -> String {
        if raw == "::1" {
            return "127.0.0.1".to_string();
        }
        raw.strip_prefix("::ffff:").unwrap_or(raw).to_string()
    }

    #[must_use]
    pub fn is_allowed(&self, raw_ip: &str) -> bool {
        let ip = Self::normalize_ip(raw_ip);
        match self.mode {
            AccessMode::Disabled => true,
            AccessMode::Whitelist => {
                self.whitelist.is_empty() || self.whitelist.iter().any(|e| entry_matches(e, &ip))
            }
            AccessMode::Blacklist => {
                self.blacklist.is_empty() || !self.blacklist.iter().any(|e| entry_matches(e, &ip))
            }
        }
    }
}

/// Match one access-list entry (literal or CIDR) against a normalized IP.
fn entry_matches(entry: &str, ip: &str) -> bool {
    match entry.split_once('/') {
        Some((range, bits)) => cidr_matches(range, bits, ip),
        None => entry == ip,
    }
}

fn ipv4_to_u32(ip: &str) -> Option<u32> {
    let mut octets = [0u8; 4];
    let mut parts = ip.split('.');
    for octet in &mut octets {
        *octet = parts.next()?.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(u32::from_be_bytes(octets))
}

fn cidr_matches(range: &str, bits: &str, ip: &str) -> bool {
    let Some(bits) = bits.parse::<u32>().ok().filter(|b| *b <= 32) else {
        return false;
    };
    let (Some(range_addr), Some(ip_addr)) = (ipv4_to_u32(range), ipv4_to_u32(ip)) else {
        return false;
    };
    let mask: u32 = if bits == 0 {
        0
    } else {
        !((1u32 << (32 - bits)) - 1)
    };
    (range_addr & mask) == (ip_addr & mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_permits_all() {
        let p = AccessPolicy {
            mode: AccessMode::Disabled,
            whitelist: vec!["1.2.3.4".into()],
            blacklist: vec!["9.9.9.9".into()],
        };
        assert!(p.is_allowed("5.6.7.8"));
    }

    #[test]
    fn whitelist_empty_permits_all() {
        let p = AccessPolicy {
            mode: AccessMode::Whitelist,
            whitelist: vec![],
            blacklist: vec![],
        };
        assert!(p.is_allowed("1.2.3.4"));
    }

    #[test]
    fn cidr_range_matching() {
        let p = AccessPolicy {
            mode: AccessMode::Whitelist,
            whitelist: vec!["10.0.0.0/24".into()],
            blacklist: vec![],
        };
        assert!(p.is_allowed("10.0.0.42"));
        assert!(!p.is_allowed("10.0.1.42"));
    }

    #[test]
    fn normalizes_loopback_and_mapped_v4() {
        assert_eq!(AccessPolicy::normalize_ip("::1"), "127.0.0.1");
        assert_eq!(AccessPolicy::normalize_ip("::ffff:1.2.3.4"), "1.2.3.4");
    }

    #[test]
    fn blacklist_empty_permits_all() {
        let p = AccessPolicy {
            mode: AccessMode::Blacklist,
            whitelist: vec![],
            blacklist: vec![],
        };
        assert!(p.is_allowed("1.2.3.4"));
    }
}
