//! Arbitrary address ranges and minimal CIDR decomposition.
//!
//! A [`Range`] is a pair of first/last addresses that need not be aligned
//! to any prefix boundary. [`Range::networks`] decomposes it into the
//! minimal ordered set of CIDR blocks covering it exactly.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::One;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::IpError;
use crate::ip::{Addresses, Ip, Version};
use crate::network::Network;

/// An inclusive span of addresses of one version.
///
/// Invariant: `first_ip <= last_ip`, enforced at construction.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub struct Range {
    first_ip: Ip,
    last_ip: Ip,
}

impl Range {
    /// Create a range from its inclusive bounds.
    pub fn new(first_ip: Ip, last_ip: Ip) -> Result<Range, IpError> {
        if first_ip.version() != last_ip.version() {
            return Err(IpError::VersionMismatch);
        }
        if first_ip > last_ip {
            return Err(IpError::InvalidArgument(format!(
                "range first address {first_ip} is greater than last address {last_ip}"
            )));
        }
        Ok(Range { first_ip, last_ip })
    }

    /// Parse a range from text.
    ///
    /// Accepted forms:
    /// * `addr1-addr2`
    /// * CIDR or netmask notation (delegated to [`Network::parse`])
    /// * wildcard notation: `*` in an octet (v4) or group (v6) position
    ///   spans all values there, e.g. `192.168.1.*`
    /// * a bare address (a single-address range)
    pub fn parse(text: &str) -> Result<Range, IpError> {
        if text.contains('/') || text.contains(' ') {
            let network = Network::parse(text)?;
            Range::new(network.first_ip(), network.last_ip())
        } else if text.contains('*') {
            let ones = if text.contains(':') { "ffff" } else { "255" };
            let first_ip = Ip::parse(&text.replace('*', "0"))?;
            let last_ip = Ip::parse(&text.replace('*', ones))?;
            Range::new(first_ip, last_ip)
        } else if let Some((first, last)) = text.split_once('-') {
            Range::new(Ip::parse(first)?, Ip::parse(last)?)
        } else {
            let ip = Ip::parse(text)?;
            Range::new(ip, ip)
        }
    }

    pub fn version(&self) -> Version {
        self.first_ip.version()
    }

    pub fn first_ip(&self) -> Ip {
        self.first_ip
    }

    pub fn last_ip(&self) -> Ip {
        self.last_ip
    }

    /// Move the lower bound. Must not pass the upper bound.
    pub fn set_first_ip(&mut self, ip: Ip) -> Result<(), IpError> {
        if ip.version() != self.version() {
            return Err(IpError::VersionMismatch);
        }
        if ip > self.last_ip {
            return Err(IpError::InvalidArgument(format!(
                "first address {ip} is greater than last address {}",
                self.last_ip
            )));
        }
        self.first_ip = ip;
        Ok(())
    }

    /// Move the upper bound. Must not pass the lower bound.
    pub fn set_last_ip(&mut self, ip: Ip) -> Result<(), IpError> {
        if ip.version() != self.version() {
            return Err(IpError::VersionMismatch);
        }
        if ip < self.first_ip {
            return Err(IpError::InvalidArgument(format!(
                "last address {ip} is less than first address {}",
                self.first_ip
            )));
        }
        self.last_ip = ip;
        Ok(())
    }

    /// Check if an address lies within the range.
    pub fn contains(&self, ip: &Ip) -> bool {
        ip.version() == self.version() && *ip >= self.first_ip && *ip <= self.last_ip
    }

    /// Number of addresses in the range: last - first + 1.
    pub fn count(&self) -> BigUint {
        self.last_ip.to_long() - self.first_ip.to_long() + BigUint::one()
    }

    /// Lazily iterate every address in increasing order.
    pub fn iter(&self) -> Addresses {
        Addresses::new(self.first_ip, self.last_ip)
    }

    /// Decompose the range into the minimal ordered set of CIDR blocks
    /// covering it exactly.
    ///
    /// Greedy: at each step the emitted block is the largest power of two
    /// that starts aligned at the cursor (bounded by its trailing zero
    /// bits) and does not overrun the range.
    pub fn networks(&self) -> Vec<Network> {
        let version = self.version();
        let max_bits = u64::from(self.first_ip.max_prefix_len());
        let last = self.last_ip.to_long();
        let mut cursor = self.first_ip.to_long();
        let mut networks = Vec::new();

        while cursor <= last {
            let remaining = &last - &cursor + BigUint::one();
            let align_bits = cursor.trailing_zeros().unwrap_or(max_bits).min(max_bits);
            let span_bits = remaining.bits() - 1;
            let block_bits = align_bits.min(span_bits);
            let prefix_len = (max_bits - block_bits) as u32;

            let ip = Ip::from_long(&cursor, version)
                .unwrap_or_else(|e| panic!("Error building block address: {e}"));
            let network = Network::new(ip, prefix_len)
                .unwrap_or_else(|e| panic!("Error building block network: {e}"));
            log::debug!("networks: emitting {network} from cursor {ip}");
            networks.push(network);

            cursor += BigUint::one() << block_bits;
        }
        networks
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.first_ip, self.last_ip)
    }
}

impl FromStr for Range {
    type Err = IpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Range::parse(s)
    }
}

impl Serialize for Range {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Range {
    fn deserialize<D>(deserializer: D) -> Result<Range, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Range::parse(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(text: &str) -> Range {
        Range::parse(text).unwrap()
    }

    fn ip(text: &str) -> Ip {
        Ip::parse(text).unwrap()
    }

    #[test]
    fn test_parse() {
        let cases = [
            (
                "127.0.0.1-127.255.255.255",
                ("127.0.0.1", "127.255.255.255"),
            ),
            ("127.0.0.1/24", ("127.0.0.0", "127.0.0.255")),
            ("127.*.0.0", ("127.0.0.0", "127.255.0.0")),
            ("127.255.255.0", ("127.255.255.0", "127.255.255.0")),
            ("10.0.0.0 255.255.255.0", ("10.0.0.0", "10.0.0.255")),
            ("2001:db8::/126", ("2001:db8::", "2001:db8::3")),
            ("2001:db8::*", ("2001:db8::0", "2001:db8::ffff")),
        ];
        for (text, (first, last)) in cases {
            let parsed = range(text);
            assert_eq!(parsed.first_ip(), ip(first), "first of {text}");
            assert_eq!(parsed.last_ip(), ip(last), "last of {text}");
        }
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Range::parse("cake").is_err());
        assert!(Range::parse("10.0.0.1-cake").is_err());
        assert!(Range::parse("10.0.0.1//24").is_err());
        assert!(matches!(
            Range::parse("10.0.0.5-10.0.0.1"),
            Err(IpError::InvalidArgument(_))
        ));
        assert_eq!(
            Range::parse("10.0.0.1-2001:db8::"),
            Err(IpError::VersionMismatch)
        );
    }

    #[test]
    fn test_bounds_setters() {
        let mut r = range("10.0.0.10-10.0.0.20");
        r.set_first_ip(ip("10.0.0.15")).unwrap();
        r.set_last_ip(ip("10.0.0.30")).unwrap();
        assert_eq!(r.to_string(), "10.0.0.15-10.0.0.30");

        assert!(matches!(
            r.set_first_ip(ip("10.0.0.31")),
            Err(IpError::InvalidArgument(_))
        ));
        assert!(matches!(
            r.set_last_ip(ip("10.0.0.14")),
            Err(IpError::InvalidArgument(_))
        ));
        assert_eq!(r.set_first_ip(ip("::1")), Err(IpError::VersionMismatch));
    }

    #[test]
    fn test_contains() {
        let r = range("192.168.*.*");
        assert!(r.contains(&ip("192.168.245.15")));
        assert!(!r.contains(&ip("192.169.255.255")));
        assert!(!r.contains(&ip("2001:db8::1")));

        let r = range("10.10.45.48/28");
        assert!(r.contains(&ip("10.10.45.58")));

        let r = range("2001:db8::/64");
        assert!(r.contains(&ip("2001:db8::ffff")));
        assert!(!r.contains(&ip("2001:db8:ffff::")));
    }

    #[test]
    fn test_count() {
        assert_eq!(range("192.168.2.*").count(), BigUint::from(256u32));
        assert_eq!(range("2001:db8::/120").count(), BigUint::from(256u32));
        assert_eq!(range("10.0.0.7").count(), BigUint::one());
        assert_eq!(range("::/0").count(), BigUint::one() << 128);
    }

    #[test]
    fn test_iteration_reaches_last() {
        let r = range("2001:db8::/120");
        let mut seen = 0u32;
        let mut last = None;
        for addr in r.iter() {
            seen += 1;
            assert!(seen <= 256, "iteration ran past the range end");
            last = Some(addr);
        }
        assert_eq!(seen, 256);
        assert_eq!(last, Some(r.last_ip()));
    }

    #[test]
    fn test_networks() {
        let cases: [(&str, &[&str]); 5] = [
            ("192.168.1.*", &["192.168.1.0/24"]),
            (
                "192.168.1.208-192.168.1.255",
                &["192.168.1.208/28", "192.168.1.224/27"],
            ),
            (
                "192.168.1.0-192.168.1.191",
                &["192.168.1.0/25", "192.168.1.128/26"],
            ),
            (
                "192.168.1.125-192.168.1.126",
                &["192.168.1.125/32", "192.168.1.126/32"],
            ),
            ("0.0.0.0-255.255.255.255", &["0.0.0.0/0"]),
        ];
        for (text, expected) in cases {
            let result: Vec<String> = range(text)
                .networks()
                .iter()
                .map(|n| n.to_string())
                .collect();
            assert_eq!(result, expected, "decomposition of {text}");
        }
    }

    #[test]
    fn test_networks_v6() {
        let result: Vec<String> = range("2001:db8::-2001:db8::3")
            .networks()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(result, ["2001:db8::/126"]);

        let result: Vec<String> = range("::-ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff")
            .networks()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(result, ["::/0"]);
    }

    #[test]
    fn test_networks_exact_cover() {
        let r = range("10.0.0.3-10.0.1.9");
        let blocks = r.networks();

        // contiguous, ordered, non-overlapping, exactly covering the range
        assert_eq!(blocks.first().map(|n| n.first_ip()), Some(r.first_ip()));
        assert_eq!(blocks.last().map(|n| n.last_ip()), Some(r.last_ip()));
        for pair in blocks.windows(2) {
            assert_eq!(pair[0].last_ip().next(1), pair[1].first_ip());
        }
        let total: BigUint = blocks.iter().map(|n| n.count()).sum();
        assert_eq!(total, r.count());
    }

    #[test]
    fn test_serde_string_form() {
        let r = range("10.0.0.1-10.0.0.9");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"10.0.0.1-10.0.0.9\"");
        let back: Range = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
