//! CIDR networks and netmask algebra.
//!
//! A [`Network`] is a base address plus a prefix length. The stored base
//! may be any address inside the block; the canonical network address is
//! derived on demand via [`Network::network`].

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::One;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::IpError;
use crate::ip::{Addresses, Ip, Version};

/// Convert a prefix length to its netmask address.
///
/// # Examples
/// ```
/// use iptools::{prefix_to_netmask, Version};
/// let mask = prefix_to_netmask(24, Version::V4).unwrap();
/// assert_eq!(mask.to_string(), "255.255.255.0");
/// ```
pub fn prefix_to_netmask(prefix_len: u32, version: Version) -> Result<Ip, IpError> {
    if prefix_len > version.max_prefix_len() {
        return Err(IpError::InvalidPrefixLength(format!(
            "{prefix_len} exceeds {} bits for {version}",
            version.max_prefix_len()
        )));
    }
    let mask = match version {
        Version::V4 => {
            let right_len = 32 - prefix_len;
            let all_bits = u32::MAX as u64;
            Ip::V4(Ipv4Addr::from(((all_bits >> right_len) << right_len) as u32))
        }
        Version::V6 => {
            let bits = if prefix_len == 0 {
                0
            } else {
                u128::MAX << (128 - prefix_len)
            };
            Ip::V6(Ipv6Addr::from(bits))
        }
    };
    Ok(mask)
}

/// Count the leading one-bits of a netmask.
///
/// Trailing bits are not validated: a non-contiguous mask yields the
/// count up to its first zero bit.
pub fn netmask_to_prefix(mask: &Ip) -> u32 {
    match mask {
        Ip::V4(addr) => u32::from(*addr).leading_ones(),
        Ip::V6(addr) => u128::from(*addr).leading_ones(),
    }
}

/// A CIDR block: base address plus prefix length.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub struct Network {
    ip: Ip,
    prefix_len: u32,
}

impl Network {
    /// Create a network from a base address and prefix length.
    pub fn new(ip: Ip, prefix_len: u32) -> Result<Network, IpError> {
        if prefix_len > ip.max_prefix_len() {
            return Err(IpError::InvalidPrefixLength(format!(
                "{prefix_len} exceeds {} bits for {}",
                ip.max_prefix_len(),
                ip.version()
            )));
        }
        Ok(Network { ip, prefix_len })
    }

    /// Create a network from a base address and a netmask address.
    pub fn with_netmask(ip: Ip, netmask: Ip) -> Result<Network, IpError> {
        if ip.version() != netmask.version() {
            return Err(IpError::VersionMismatch);
        }
        Network::new(ip, netmask_to_prefix(&netmask))
    }

    /// Parse a network from text.
    ///
    /// Accepted forms: `address/prefixLength`, `address netmask`
    /// (space-separated), or a bare `address` (host prefix).
    pub fn parse(text: &str) -> Result<Network, IpError> {
        if let Some((addr, prefix)) = text.split_once('/') {
            let ip = Ip::parse(addr)?;
            let prefix_len = prefix.parse::<u32>().map_err(|_| {
                IpError::InvalidPrefixLength(format!("not a valid prefix length: {prefix}"))
            })?;
            Network::new(ip, prefix_len)
        } else if let Some((addr, mask)) = text.split_once(' ') {
            Network::with_netmask(Ip::parse(addr)?, Ip::parse(mask)?)
        } else {
            let ip = Ip::parse(text)?;
            Network::new(ip, ip.max_prefix_len())
        }
    }

    pub fn version(&self) -> Version {
        self.ip.version()
    }

    /// The stored base address; not necessarily the canonical network
    /// address.
    pub fn ip(&self) -> Ip {
        self.ip
    }

    pub fn prefix_len(&self) -> u32 {
        self.prefix_len
    }

    /// Reassign the base address. The version must match.
    pub fn set_ip(&mut self, ip: Ip) -> Result<(), IpError> {
        if ip.version() != self.version() {
            return Err(IpError::VersionMismatch);
        }
        self.ip = ip;
        Ok(())
    }

    /// Reassign the prefix length.
    pub fn set_prefix_len(&mut self, prefix_len: u32) -> Result<(), IpError> {
        if prefix_len > self.ip.max_prefix_len() {
            return Err(IpError::InvalidPrefixLength(format!(
                "{prefix_len} exceeds {} bits for {}",
                self.ip.max_prefix_len(),
                self.version()
            )));
        }
        self.prefix_len = prefix_len;
        Ok(())
    }

    /// Reassign the prefix length from a netmask address.
    pub fn set_netmask(&mut self, netmask: Ip) -> Result<(), IpError> {
        if netmask.version() != self.version() {
            return Err(IpError::VersionMismatch);
        }
        self.prefix_len = netmask_to_prefix(&netmask);
        Ok(())
    }

    pub fn netmask(&self) -> Ip {
        prefix_to_netmask(self.prefix_len, self.version())
            .unwrap_or_else(|e| panic!("Error calculating netmask for {self}: {e}"))
    }

    /// The inverted netmask.
    pub fn wildcard(&self) -> Ip {
        self.netmask().bitnot()
    }

    /// The canonical network address: base AND netmask.
    pub fn network(&self) -> Ip {
        self.ip
            .bitand(&self.netmask())
            .unwrap_or_else(|e| panic!("Error calculating network address for {self}: {e}"))
    }

    /// The highest address of the block: base OR wildcard.
    pub fn broadcast(&self) -> Ip {
        self.ip
            .bitor(&self.wildcard())
            .unwrap_or_else(|e| panic!("Error calculating broadcast address for {self}: {e}"))
    }

    pub fn first_ip(&self) -> Ip {
        self.network()
    }

    pub fn last_ip(&self) -> Ip {
        self.broadcast()
    }

    /// First usable host address: network + 1 when the block holds more
    /// than two addresses, otherwise the network address itself.
    pub fn first_host(&self) -> Ip {
        if self.count() > BigUint::from(2u8) {
            self.network().next(1)
        } else {
            self.network()
        }
    }

    /// Last usable host address: broadcast - 1 when the block holds more
    /// than two addresses, otherwise the broadcast address itself.
    pub fn last_host(&self) -> Ip {
        if self.count() > BigUint::from(2u8) {
            self.broadcast().prev(1)
        } else {
            self.broadcast()
        }
    }

    /// Total number of addresses in the block: 2^(max - prefix).
    pub fn count(&self) -> BigUint {
        BigUint::one() << (self.ip.max_prefix_len() - self.prefix_len)
    }

    /// Check if an address is contained within this network.
    ///
    /// An address of the other version is simply not contained.
    pub fn contains(&self, ip: &Ip) -> bool {
        ip.version() == self.version() && *ip >= self.first_ip() && *ip <= self.last_ip()
    }

    /// Lazily iterate every address of the block in increasing order.
    pub fn iter(&self) -> Addresses {
        Addresses::new(self.first_ip(), self.last_ip())
    }

    /// Lazily iterate the usable host addresses.
    ///
    /// Excludes the network and broadcast addresses only when the block
    /// holds more than two addresses; a /31 or /32 is yielded as-is.
    pub fn hosts(&self) -> Addresses {
        Addresses::new(self.first_host(), self.last_host())
    }

    /// Split the network into contiguous subnets of a longer prefix,
    /// produced lazily in increasing address order.
    pub fn subnets(&self, new_prefix_len: u32) -> Result<Subnets, IpError> {
        if new_prefix_len <= self.prefix_len || new_prefix_len > self.ip.max_prefix_len() {
            return Err(IpError::InvalidPrefixLength(format!(
                "split prefix must be in ({}, {}], got {new_prefix_len}",
                self.prefix_len,
                self.ip.max_prefix_len()
            )));
        }
        Ok(Subnets {
            cursor: Some(self.network()),
            last: self.broadcast(),
            prefix_len: new_prefix_len,
        })
    }

    /// The minimal ordered set of CIDR blocks covering this network with
    /// `exclude` removed.
    ///
    /// Repeatedly bisects the working block: the half not containing the
    /// excluded block is emitted, the other half is descended into, until
    /// the working block equals the excluded one. Excluding the whole
    /// network yields no blocks.
    pub fn exclude(&self, exclude: &Network) -> Result<Vec<Network>, IpError> {
        if exclude.version() != self.version()
            || exclude.first_ip() < self.first_ip()
            || exclude.last_ip() > self.last_ip()
        {
            return Err(IpError::NotContained);
        }

        let mut networks = Vec::new();
        let mut working = Network {
            ip: self.network(),
            prefix_len: self.prefix_len,
        };
        while working.prefix_len < exclude.prefix_len {
            let half_prefix = working.prefix_len + 1;
            let lower = Network {
                ip: working.network(),
                prefix_len: half_prefix,
            };
            let upper = Network {
                ip: lower.broadcast().next(1),
                prefix_len: half_prefix,
            };
            if lower.contains(&exclude.first_ip()) {
                networks.push(upper);
                working = lower;
            } else {
                networks.push(lower);
                working = upper;
            }
            log::debug!("exclude: kept {}, descending into {working}", networks[networks.len() - 1]);
        }
        networks.sort();
        Ok(networks)
    }

    /// Read-only summary of the network's derived fields.
    pub fn info(&self) -> NetworkInfo {
        NetworkInfo {
            network: self.network(),
            broadcast: self.broadcast(),
            first_host: self.first_host(),
            last_host: self.last_host(),
            netmask: self.netmask(),
            wildcard: self.wildcard(),
            address_count: self.count(),
        }
    }
}

/// Derived descriptive fields of a [`Network`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    pub network: Ip,
    pub broadcast: Ip,
    pub first_host: Ip,
    pub last_host: Ip,
    pub netmask: Ip,
    pub wildcard: Ip,
    pub address_count: BigUint,
}

/// Lazy iterator over the subnets of a [`Network::subnets`] split.
#[derive(Debug, Clone)]
pub struct Subnets {
    cursor: Option<Ip>,
    last: Ip,
    prefix_len: u32,
}

impl Iterator for Subnets {
    type Item = Network;

    fn next(&mut self) -> Option<Network> {
        let ip = self.cursor?;
        let network = Network {
            ip,
            prefix_len: self.prefix_len,
        };
        let block_last = network.broadcast();
        self.cursor = if block_last >= self.last {
            None
        } else {
            Some(block_last.next(1))
        };
        Some(network)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix_len)
    }
}

impl FromStr for Network {
    type Err = IpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::parse(s)
    }
}

impl Serialize for Network {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Network {
    fn deserialize<D>(deserializer: D) -> Result<Network, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Network::parse(&s).map_err(de::Error::custom)
    }
}
