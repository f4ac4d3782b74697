//! IP address value type and arithmetic.
//!
//! [`Ip`] wraps the std big-endian address types and adds the operations
//! the network and range algebra is built on: literal parsing in several
//! notations, wrapping successor/predecessor stepping, bitwise masking,
//! big-integer conversion and reverse-DNS pointers.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::OnceLock;

use num_bigint::BigUint;
use regex::Regex;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::IpError;

/// IP protocol version tag carrying the version-specific constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    V4,
    V6,
}

impl Version {
    /// Maximum prefix length: 32 for v4, 128 for v6.
    pub const fn max_prefix_len(self) -> u32 {
        match self {
            Version::V4 => 32,
            Version::V6 => 128,
        }
    }

    /// Address width in octets: 4 for v4, 16 for v6.
    pub const fn octet_count(self) -> usize {
        match self {
            Version::V4 => 4,
            Version::V6 => 16,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Version::V4 => write!(f, "IPv4"),
            Version::V6 => write!(f, "IPv6"),
        }
    }
}

/// An IPv4 or IPv6 address.
///
/// Immutable value type; every arithmetic operation produces a new
/// address. Ordering is unsigned, most-significant-octet first, with all
/// v4 addresses sorting before all v6 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Ip {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
}

static HEX_RE: OnceLock<Regex> = OnceLock::new();
static BIN_RE: OnceLock<Regex> = OnceLock::new();

fn hex_re() -> &'static Regex {
    HEX_RE.get_or_init(|| {
        Regex::new(r"^([0-9a-fA-F]{8}|[0-9a-fA-F]{32})$").expect("Invalid Regex")
    })
}

fn bin_re() -> &'static Regex {
    BIN_RE.get_or_init(|| Regex::new(r"^([01]{32}|[01]{128})$").expect("Invalid Regex"))
}

impl Ip {
    /// Parse an address literal.
    ///
    /// Accepted notations:
    /// * dotted-decimal (`"192.0.2.5"`)
    /// * colon-hex with `::` compression (`"2001:db8::1"`)
    /// * `0x`-prefixed hex, 8 or 32 digits (`"0x7f000001"`)
    /// * `0b`-prefixed binary, 32 or 128 digits
    /// * plain decimal (long form); values fitting 32 bits become v4,
    ///   larger values up to 128 bits become v6, and anything wider fails
    ///   with [`IpError::InvalidVersion`]
    pub fn parse(text: &str) -> Result<Self, IpError> {
        if let Some(hex) = text.strip_prefix("0x") {
            Self::parse_hex(hex)
        } else if let Some(bin) = text.strip_prefix("0b") {
            Self::parse_bin(bin)
        } else if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            let value = text.parse::<u128>().map_err(|_| {
                IpError::InvalidVersion(format!("decimal value does not fit 128 bits: {text}"))
            })?;
            match u32::try_from(value) {
                Ok(v4) => Ok(Ip::V4(Ipv4Addr::from(v4))),
                Err(_) => Ok(Ip::V6(Ipv6Addr::from(value))),
            }
        } else {
            match text.parse::<IpAddr>() {
                Ok(IpAddr::V4(addr)) => Ok(Ip::V4(addr)),
                Ok(IpAddr::V6(addr)) => Ok(Ip::V6(addr)),
                Err(_) => Err(IpError::InvalidFormat(text.to_string())),
            }
        }
    }

    /// Parse a bare hexadecimal address body (no `0x` prefix).
    pub fn parse_hex(hex: &str) -> Result<Self, IpError> {
        if !hex_re().is_match(hex) {
            return Err(IpError::InvalidFormat(format!(
                "invalid hexadecimal IP address: {hex}"
            )));
        }
        if hex.len() == 8 {
            let bits = u32::from_str_radix(hex, 16)
                .map_err(|_| IpError::InvalidFormat(hex.to_string()))?;
            Ok(Ip::V4(Ipv4Addr::from(bits)))
        } else {
            let bits = u128::from_str_radix(hex, 16)
                .map_err(|_| IpError::InvalidFormat(hex.to_string()))?;
            Ok(Ip::V6(Ipv6Addr::from(bits)))
        }
    }

    /// Parse a bare binary address body (no `0b` prefix).
    pub fn parse_bin(bin: &str) -> Result<Self, IpError> {
        if !bin_re().is_match(bin) {
            return Err(IpError::InvalidFormat(format!(
                "invalid binary IP address: {bin}"
            )));
        }
        if bin.len() == 32 {
            let bits = u32::from_str_radix(bin, 2)
                .map_err(|_| IpError::InvalidFormat(bin.to_string()))?;
            Ok(Ip::V4(Ipv4Addr::from(bits)))
        } else {
            let bits = u128::from_str_radix(bin, 2)
                .map_err(|_| IpError::InvalidFormat(bin.to_string()))?;
            Ok(Ip::V6(Ipv6Addr::from(bits)))
        }
    }

    /// Build an address from its big-endian octets (4 or 16 bytes).
    pub fn from_octets(octets: &[u8]) -> Result<Self, IpError> {
        match octets.len() {
            4 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(octets);
                Ok(Ip::V4(Ipv4Addr::from(buf)))
            }
            16 => {
                let mut buf = [0u8; 16];
                buf.copy_from_slice(octets);
                Ok(Ip::V6(Ipv6Addr::from(buf)))
            }
            n => Err(IpError::InvalidFormat(format!(
                "expected 4 or 16 octets, got {n}"
            ))),
        }
    }

    /// Build an address of the given version from an unsigned integer.
    ///
    /// Fails with [`IpError::InvalidArgument`] when the value does not fit
    /// the version's bit width.
    pub fn from_long(value: &BigUint, version: Version) -> Result<Self, IpError> {
        if value.bits() > u64::from(version.max_prefix_len()) {
            return Err(IpError::InvalidArgument(format!(
                "{value} does not fit a {version} address"
            )));
        }
        let bytes = value.to_bytes_be();
        let mut buf = vec![0u8; version.octet_count()];
        let offset = buf.len() - bytes.len();
        buf[offset..].copy_from_slice(&bytes);
        Self::from_octets(&buf)
    }

    /// The address as an unsigned big-endian integer.
    pub fn to_long(&self) -> BigUint {
        BigUint::from_bytes_be(&self.octets())
    }

    pub fn version(&self) -> Version {
        match self {
            Ip::V4(_) => Version::V4,
            Ip::V6(_) => Version::V6,
        }
    }

    pub fn max_prefix_len(&self) -> u32 {
        self.version().max_prefix_len()
    }

    pub fn octet_count(&self) -> usize {
        self.version().octet_count()
    }

    /// Big-endian octets of the address.
    pub fn octets(&self) -> Vec<u8> {
        match self {
            Ip::V4(addr) => addr.octets().to_vec(),
            Ip::V6(addr) => addr.octets().to_vec(),
        }
    }

    /// The address `step` positions higher.
    ///
    /// Wraps modulo the address width: stepping past the all-ones address
    /// continues from all-zeros.
    pub fn next(&self, step: u128) -> Ip {
        match self {
            Ip::V4(addr) => Ip::V4(Ipv4Addr::from(u32::from(*addr).wrapping_add(step as u32))),
            Ip::V6(addr) => Ip::V6(Ipv6Addr::from(u128::from(*addr).wrapping_add(step))),
        }
    }

    /// The address `step` positions lower.
    ///
    /// Wraps modulo the address width: stepping below all-zeros continues
    /// from the all-ones address.
    pub fn prev(&self, step: u128) -> Ip {
        match self {
            Ip::V4(addr) => Ip::V4(Ipv4Addr::from(u32::from(*addr).wrapping_sub(step as u32))),
            Ip::V6(addr) => Ip::V6(Ipv6Addr::from(u128::from(*addr).wrapping_sub(step))),
        }
    }

    /// Bitwise AND of two addresses of the same version.
    pub fn bitand(&self, other: &Ip) -> Result<Ip, IpError> {
        match (self, other) {
            (Ip::V4(a), Ip::V4(b)) => Ok(Ip::V4(Ipv4Addr::from(u32::from(*a) & u32::from(*b)))),
            (Ip::V6(a), Ip::V6(b)) => Ok(Ip::V6(Ipv6Addr::from(u128::from(*a) & u128::from(*b)))),
            _ => Err(IpError::VersionMismatch),
        }
    }

    /// Bitwise OR of two addresses of the same version.
    pub fn bitor(&self, other: &Ip) -> Result<Ip, IpError> {
        match (self, other) {
            (Ip::V4(a), Ip::V4(b)) => Ok(Ip::V4(Ipv4Addr::from(u32::from(*a) | u32::from(*b)))),
            (Ip::V6(a), Ip::V6(b)) => Ok(Ip::V6(Ipv6Addr::from(u128::from(*a) | u128::from(*b)))),
            _ => Err(IpError::VersionMismatch),
        }
    }

    /// Bitwise complement.
    pub fn bitnot(&self) -> Ip {
        match self {
            Ip::V4(addr) => Ip::V4(Ipv4Addr::from(!u32::from(*addr))),
            Ip::V6(addr) => Ip::V6(Ipv6Addr::from(!u128::from(*addr))),
        }
    }

    /// Zero-padded binary rendering of the full address width.
    pub fn to_bin(&self) -> String {
        match self {
            Ip::V4(addr) => format!("{:032b}", u32::from(*addr)),
            Ip::V6(addr) => format!("{:0128b}", u128::from(*addr)),
        }
    }

    /// Zero-padded lowercase hex rendering of the full address width.
    pub fn to_hex(&self) -> String {
        match self {
            Ip::V4(addr) => format!("{:08x}", u32::from(*addr)),
            Ip::V6(addr) => format!("{:032x}", u128::from(*addr)),
        }
    }

    /// Reverse-DNS lookup name: `in-addr.arpa` for v4, `ip6.arpa` for v6.
    pub fn reverse_pointer(&self) -> String {
        match self {
            Ip::V4(addr) => {
                let labels: Vec<String> = addr
                    .octets()
                    .iter()
                    .rev()
                    .map(|octet| octet.to_string())
                    .collect();
                format!("{}.in-addr.arpa", labels.join("."))
            }
            Ip::V6(_) => {
                let labels: Vec<String> = self
                    .to_hex()
                    .chars()
                    .rev()
                    .map(|nibble| nibble.to_string())
                    .collect();
                format!("{}.ip6.arpa", labels.join("."))
            }
        }
    }
}

impl fmt::Display for Ip {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Ip::V4(addr) => addr.fmt(f),
            Ip::V6(addr) => addr.fmt(f),
        }
    }
}

impl FromStr for Ip {
    type Err = IpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ip::parse(s)
    }
}

impl From<IpAddr> for Ip {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(addr) => Ip::V4(addr),
            IpAddr::V6(addr) => Ip::V6(addr),
        }
    }
}

impl From<Ip> for IpAddr {
    fn from(ip: Ip) -> Self {
        match ip {
            Ip::V4(addr) => IpAddr::V4(addr),
            Ip::V6(addr) => IpAddr::V6(addr),
        }
    }
}

impl Serialize for Ip {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ip {
    fn deserialize<D>(deserializer: D) -> Result<Ip, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ip::parse(&s).map_err(de::Error::custom)
    }
}

/// Lazy iterator over an inclusive address span.
///
/// Steps by address successor and terminates after yielding the last
/// address, so a span ending at the top of the address space cannot wrap.
#[derive(Debug, Clone)]
pub struct Addresses {
    cursor: Option<Ip>,
    last: Ip,
}

impl Addresses {
    pub(crate) fn new(first: Ip, last: Ip) -> Self {
        Addresses {
            cursor: (first <= last).then_some(first),
            last,
        }
    }
}

impl Iterator for Addresses {
    type Item = Ip;

    fn next(&mut self) -> Option<Ip> {
        let ip = self.cursor?;
        self.cursor = if ip >= self.last {
            None
        } else {
            Some(ip.next(1))
        };
        Some(ip)
    }
}
