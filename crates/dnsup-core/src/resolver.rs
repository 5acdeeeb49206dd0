//! Interface address resolver
//!
//! Enumerates the host's network interfaces and picks the base addresses
//! that per-host templates merge against: one IPv4 address from the
//! interface named as the v4 source, and one IPv6 prefix (the address
//! masked to its own declared prefix length) from the v6 source.
//!
//! Selection is first-match in enumeration order, restricted to
//! global-unicast addresses. An interface with no qualifying address
//! contributes nothing; whether that is fatal is decided later, when a host
//! actually needs the missing family.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::Result;

/// One address as reported by the operating system for an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddr {
    /// Interface name, e.g. `eth0`
    pub interface: String,
    /// The address itself
    pub addr: IpAddr,
    /// Declared prefix length of the address's network
    pub prefix_len: u8,
}

/// Base addresses discovered from live interface state.
///
/// Computed once per run; read-only input to merging. `ipv6_prefix` is
/// already masked to its declared prefix length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredAddresses {
    /// First global-unicast IPv4 address on the v4-source interface
    pub ipv4: Option<Ipv4Addr>,
    /// First global-unicast IPv6 address on the v6-source interface, masked
    pub ipv6_prefix: Option<Ipv6Addr>,
}

impl DiscoveredAddresses {
    /// Resolve from live OS interface state.
    ///
    /// Fails only if the interface list itself cannot be enumerated.
    pub fn discover(v4_from: &str, v6_from: &str) -> Result<Self> {
        let addrs = enumerate()?;
        Ok(Self::select(&addrs, v4_from, v6_from))
    }

    /// Pure selection over an already-enumerated address list.
    pub fn select(addrs: &[InterfaceAddr], v4_from: &str, v6_from: &str) -> Self {
        let ipv4 = addrs
            .iter()
            .filter(|a| a.interface == v4_from && is_global_unicast(a.addr))
            .find_map(|a| as_v4(a.addr));

        let ipv6_prefix = addrs
            .iter()
            .filter(|a| a.interface == v6_from && is_global_unicast(a.addr))
            .find_map(|a| match a.addr {
                IpAddr::V6(v6) if as_v4(a.addr).is_none() => {
                    Some(mask_prefix(v6, a.prefix_len))
                }
                _ => None,
            });

        Self { ipv4, ipv6_prefix }
    }
}

/// Enumerate all interface addresses via the OS.
pub fn enumerate() -> Result<Vec<InterfaceAddr>> {
    let mut out = Vec::new();
    for iface in if_addrs::get_if_addrs()? {
        let prefix_len = match &iface.addr {
            if_addrs::IfAddr::V4(a) => u32::from(a.netmask).count_ones() as u8,
            if_addrs::IfAddr::V6(a) => u128::from(a.netmask).count_ones() as u8,
        };
        out.push(InterfaceAddr {
            interface: iface.name.clone(),
            addr: iface.ip(),
            prefix_len,
        });
    }
    Ok(out)
}

/// Whether an address is usable for general internet routing: not
/// unspecified, loopback, link-local, or multicast.
fn is_global_unicast(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !v4.is_unspecified() && !v4.is_loopback() && !v4.is_link_local() && !v4.is_multicast()
        }
        IpAddr::V6(v6) => {
            !v6.is_unspecified()
                && !v6.is_loopback()
                && !v6.is_multicast()
                // fe80::/10
                && (v6.segments()[0] & 0xffc0) != 0xfe80
        }
    }
}

/// Reduce to a 4-byte form if possible: a real IPv4 address, or a
/// v4-mapped IPv6 address.
fn as_v4(ip: IpAddr) -> Option<Ipv4Addr> {
    match ip {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    }
}

/// Zero the host bits of `addr` beyond `prefix_len`.
fn mask_prefix(addr: Ipv6Addr, prefix_len: u8) -> Ipv6Addr {
    let mask = if prefix_len == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix_len).min(128))
    };
    Ipv6Addr::from(u128::from(addr) & mask)
}
