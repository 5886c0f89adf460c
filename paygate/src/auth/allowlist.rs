//! Tenant IP allowlists.
//!
//! An allowlist entry is either a literal address (`203.0.113.7`) or a CIDR range
//! (`10.0.0.0/24`, `2001:db8::/32`). Entries that cannot be parsed never match, and a
//! request with no source IP is never allowed.

use std::net::IpAddr;
use std::str::FromStr;

/// Reasons a CIDR entry is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CidrError {
    #[error("CIDR entry has no prefix length")]
    MissingPrefix,

    #[error("invalid network address: {0}")]
    InvalidAddress(String),

    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),

    #[error("prefix length {prefix} exceeds address width {width}")]
    PrefixTooLong { prefix: u8, width: u8 },
}

/// A parsed `base/prefix` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrRange {
    pub network: IpAddr,
    pub prefix_len: u8,
}

impl CidrRange {
    /// Whether `ip` falls inside this range. Addresses of a different family never match.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => prefix_matches(&net.octets(), &addr.octets(), self.prefix_len),
            (IpAddr::V6(net), IpAddr::V6(addr)) => prefix_matches(&net.octets(), &addr.octets(), self.prefix_len),
            _ => false,
        }
    }
}

impl FromStr for CidrRange {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, prefix) = s.trim().split_once('/').ok_or(CidrError::MissingPrefix)?;

        let network = IpAddr::from_str(base.trim()).map_err(|_| CidrError::InvalidAddress(base.to_string()))?;
        let prefix_len = prefix
            .trim()
            .parse::<u8>()
            .map_err(|_| CidrError::InvalidPrefix(prefix.to_string()))?;

        let width = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > width {
            return Err(CidrError::PrefixTooLong { prefix: prefix_len, width });
        }

        Ok(Self { network, prefix_len })
    }
}

/// Compare the first `prefix_len` bits of two equally sized addresses.
///
/// Whole bytes are compared first, then the remaining `prefix_len % 8` high bits of the
/// next byte under a mask.
fn prefix_matches(network: &[u8], candidate: &[u8], prefix_len: u8) -> bool {
    let full_bytes = usize::from(prefix_len / 8);
    let remaining_bits = prefix_len % 8;

    if network[..full_bytes] != candidate[..full_bytes] {
        return false;
    }

    if remaining_bits == 0 {
        return true;
    }

    let mask = 0xFFu8 << (8 - remaining_bits);
    (network[full_bytes] & mask) == (candidate[full_bytes] & mask)
}

/// Whether `entry` (a literal address or a CIDR range) admits `ip`.
fn entry_matches(ip: &str, entry: &str) -> bool {
    if entry.contains('/') {
        let Ok(range) = CidrRange::from_str(entry) else {
            tracing::debug!(entry, "Skipping unparseable CIDR allowlist entry");
            return false;
        };
        let Ok(candidate) = IpAddr::from_str(ip) else {
            return false;
        };
        range.contains(&candidate)
    } else {
        entry.trim().eq_ignore_ascii_case(ip)
    }
}

/// Return true iff `ip` matches a literal entry or falls within a CIDR entry.
///
/// Blank entries are skipped. An empty `ip` is never allowed.
pub fn is_ip_allowed<S: AsRef<str>>(ip: &str, entries: &[S]) -> bool {
    let ip = ip.trim();
    if ip.is_empty() {
        return false;
    }

    entries
        .iter()
        .map(AsRef::as_ref)
        .filter(|entry| !entry.trim().is_empty())
        .any(|entry| entry_matches(ip, entry))
}
