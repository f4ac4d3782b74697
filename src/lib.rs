//! IPv4/IPv6 address, network and range arithmetic.
//!
//! The crate is built around three value types:
//! - [`Ip`] - a single v4 or v6 address with successor/predecessor
//!   stepping, bitwise masking, big-integer conversion and reverse-DNS
//!   pointers
//! - [`Network`] - a CIDR block with containment, iteration, subnet
//!   splitting and subnet exclusion
//! - [`Range`] - an arbitrary inclusive address span with minimal-CIDR
//!   decomposition

mod error;
mod ip;
mod network;
mod range;

// Re-export public types
pub use error::IpError;
pub use ip::{Addresses, Ip, Version};
pub use network::{netmask_to_prefix, prefix_to_netmask, Network, NetworkInfo, Subnets};
pub use range::Range;
