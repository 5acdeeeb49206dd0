//! Partial addresses: CIDR-shaped per-host templates
//!
//! A partial address is a configuration value in CIDR notation, e.g.
//! `0.0.0.9/24` or `::1234:1234:1234:1234/64`. The prefix length selects
//! which bits are inherited from a discovered interface address; the
//! literal's own bits fill in the rest. Static and dynamic hosts share one
//! mechanism: a `/0` partial carries the complete address in its own bits,
//! while a zero-based `/32` (or `/128`) partial publishes the discovered
//! address unchanged.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use ipnet::IpNet;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::error::{Error, Result};

/// A parsed per-host address template: base bits plus a contiguous
/// leading-ones mask derived from the CIDR prefix length.
///
/// Constructed once at configuration-load time and immutable thereafter.
/// The address family is derived from the literal, never stored separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialAddress {
    net: IpNet,
}

impl PartialAddress {
    /// Whether this partial is IPv4-shaped (and therefore merges against the
    /// discovered IPv4 address and publishes an A record).
    pub fn is_v4(&self) -> bool {
        matches!(self.net, IpNet::V4(_))
    }

    /// The template's base bits as parsed from the literal.
    pub fn base(&self) -> IpAddr {
        self.net.addr()
    }

    /// The CIDR prefix length of the mask.
    pub fn prefix_len(&self) -> u8 {
        self.net.prefix_len()
    }

    /// Compose a discovered base address with this template.
    ///
    /// The mask's covered bits come from `discovered`, the remaining bits
    /// from the template's own base bits:
    ///
    /// ```text
    /// merged = (discovered & mask) | base_bits
    /// ```
    ///
    /// For IPv6 the intended use is "prefix from interface, suffix from
    /// config": the discovered value is the provider's advertised prefix and
    /// the template carries the host identifier in its low bits. Sizing the
    /// prefix length so that base bits and mask do not overlap is a
    /// configuration contract, not enforced here.
    ///
    /// The families of `discovered` and the template must match.
    pub fn merge(&self, discovered: IpAddr) -> Result<IpAddr> {
        match (&self.net, discovered) {
            (IpNet::V4(net), IpAddr::V4(base)) => {
                let mask = u32::from(net.netmask());
                let merged = (u32::from(base) & mask) | u32::from(net.addr());
                Ok(IpAddr::V4(Ipv4Addr::from(merged)))
            }
            (IpNet::V6(net), IpAddr::V6(base)) => {
                let mask = u128::from(net.netmask());
                let merged = (u128::from(base) & mask) | u128::from(net.addr());
                Ok(IpAddr::V6(Ipv6Addr::from(merged)))
            }
            _ => Err(Error::invalid_input(format!(
                "cannot merge {} base address into {} template {}",
                if discovered.is_ipv4() { "IPv4" } else { "IPv6" },
                if self.is_v4() { "IPv4" } else { "IPv6" },
                self.net,
            ))),
        }
    }
}

impl FromStr for PartialAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let net = IpNet::from_str(s)
            .map_err(|e| Error::config(format!("invalid CIDR literal {s:?}: {e}")))?;
        Ok(Self { net })
    }
}

impl fmt::Display for PartialAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.net.fmt(f)
    }
}

// Partial addresses appear in YAML as plain CIDR strings.
impl<'de> Deserialize<'de> for PartialAddress {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let literal = String::deserialize(deserializer)?;
        literal.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for PartialAddress {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
