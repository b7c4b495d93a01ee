//! Target specification types with CIDR and hostname support.
//!
//! Provides flexible target parsing supporting:
//! - Single IP addresses (IPv4 and IPv6)
//! - CIDR notation (192.168.1.0/24)
//! - Hostnames (example.com)

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// A single host ready to be scanned.
///
/// `display_name` is what the user asked for and what results are reported
/// under; `address` is what gets dialed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Host {
    /// The resolved IP address.
    pub address: IpAddr,
    /// The original input (hostname or IP string).
    pub display_name: String,
}

impl Host {
    /// Create a new host.
    pub fn new(address: IpAddr, display_name: impl Into<String>) -> Self {
        Self {
            address,
            display_name: display_name.into(),
        }
    }

    /// A host named after its own address.
    pub fn from_ip(address: IpAddr) -> Self {
        Self::new(address, address.to_string())
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name == self.address.to_string() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} ({})", self.display_name, self.address)
        }
    }
}

/// Error type for target parsing and resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("invalid target format: {0}")]
    InvalidFormat(String),
    #[error("failed to resolve hostname '{0}' after {1} attempt(s)")]
    ResolutionFailed(String, u32),
    #[error("lookup of '{0}' failed: {1}")]
    LookupFailed(String, String),
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
    #[error("CIDR range too large: {0} addresses (max: {1})")]
    CidrTooLarge(u128, u128),
}

/// A target specification.
///
/// Supports:
/// - Single IP: "192.168.1.1"
/// - CIDR: "192.168.1.0/24"
/// - Hostname: "example.com"
/// - IPv6: "::1", "2001:db8::/120"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// A single IP address.
    Single(IpAddr),
    /// A CIDR network range.
    Cidr(IpNetwork),
    /// A hostname to be resolved.
    Hostname(String),
}

impl TargetSpec {
    /// Parse a target specification from a string.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();

        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::Single(ip));
        }

        if s.contains('/') {
            return Self::cidr(s);
        }

        if is_valid_hostname(s) {
            return Ok(Self::Hostname(s.to_string()));
        }

        Err(TargetError::InvalidFormat(s.to_string()))
    }

    /// Parse a string that must be a CIDR block.
    pub fn cidr(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();
        s.parse::<IpNetwork>()
            .map(Self::Cidr)
            .map_err(|_| TargetError::InvalidCidr(s.to_string()))
    }
}

impl FromStr for TargetSpec {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(ip) => write!(f, "{}", ip),
            Self::Cidr(network) => write!(f, "{}", network),
            Self::Hostname(hostname) => write!(f, "{}", hostname),
        }
    }
}

fn network_size(network: &IpNetwork) -> u128 {
    let bits = match network {
        IpNetwork::V4(_) => 32u32,
        IpNetwork::V6(_) => 128u32,
    };
    let host_bits = bits - u32::from(network.prefix());
    if host_bits >= 128 {
        u128::MAX
    } else {
        1u128 << host_bits
    }
}

/// Increment a big-endian address in place.
///
/// The last byte is incremented and a wrap from 255 to 0 carries into the
/// preceding byte. Returns `false` when the carry ran past the first byte,
/// meaning the address wrapped around to all zeroes.
pub fn increment_ip(bytes: &mut [u8]) -> bool {
    for byte in bytes.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            return true;
        }
    }
    false
}

fn next_address(ip: IpAddr) -> Option<IpAddr> {
    match ip {
        IpAddr::V4(v4) => {
            let mut octets = v4.octets();
            increment_ip(&mut octets).then(|| IpAddr::V4(Ipv4Addr::from(octets)))
        }
        IpAddr::V6(v6) => {
            let mut octets = v6.octets();
            increment_ip(&mut octets).then(|| IpAddr::V6(Ipv6Addr::from(octets)))
        }
    }
}

/// Lazy enumeration of every address in a CIDR block.
///
/// Starts at the network address and increments until the address leaves
/// the block. Network and broadcast addresses are included.
#[derive(Debug, Clone)]
pub struct CidrHosts {
    network: IpNetwork,
    next: Option<IpAddr>,
}

impl CidrHosts {
    /// Enumerate the given network.
    pub fn new(network: IpNetwork) -> Self {
        Self {
            network,
            next: Some(network.network()),
        }
    }
}

impl Iterator for CidrHosts {
    type Item = IpAddr;

    fn next(&mut self) -> Option<IpAddr> {
        let current = self.next?;
        self.next = next_address(current).filter(|ip| self.network.contains(*ip));
        Some(current)
    }
}

/// Enumerate a CIDR block, refusing blocks of more than `max_hosts` addresses.
pub fn expand_cidr(network: IpNetwork, max_hosts: u128) -> Result<CidrHosts, TargetError> {
    let size = network_size(&network);
    if size > max_hosts {
        return Err(TargetError::CidrTooLarge(size, max_hosts));
    }
    Ok(CidrHosts::new(network))
}

/// Check if a string is a valid hostname.
fn is_valid_hostname(s: &str) -> bool {
    let s = s.strip_suffix('.').unwrap_or(s);
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    // Each label must be 1-63 characters
    for label in s.split('.') {
        if label.is_empty() || label.len() > 63 {
            return false;
        }
        if !label.chars().next().map_or(false, |c| c.is_alphanumeric() || c == '_') {
            return false;
        }
        if !label.chars().last().map_or(false, |c| c.is_alphanumeric()) {
            return false;
        }
        if !label
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return false;
        }
    }

    true
}
