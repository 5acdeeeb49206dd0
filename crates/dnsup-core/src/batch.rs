//! Update batch planning
//!
//! Turns configuration plus discovered base addresses into the set of final
//! records for one run. Planning is where a missing base address for a
//! required family becomes fatal: publishing `0.0.0.0` or `::` because the
//! resolver came up empty would be an outage, not an update.

use std::collections::BTreeMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{Error, Result};
use crate::partial::PartialAddress;
use crate::resolver::DiscoveredAddresses;

/// DNS record type of a final address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
}

impl RecordType {
    /// Wire/API name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

/// One composed record ready for publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalAddress {
    /// Owner name relative to the zone
    pub host: String,
    /// Composed address
    pub addr: IpAddr,
    /// A or AAAA, matching the partial's family
    pub record_type: RecordType,
}

/// The complete set of record changes for one run.
///
/// Created once, submitted once through an update dispatcher, discarded.
#[derive(Debug, Clone)]
pub struct UpdateBatch {
    /// Zone the records belong to
    pub zone: String,
    /// TTL for every record
    pub ttl: u32,
    /// Final per-host addresses
    pub entries: Vec<FinalAddress>,
    /// Freshness marker; the signed-update path publishes it as a TXT
    /// record at the zone apex
    pub planned_at: DateTime<Utc>,
}

impl UpdateBatch {
    /// Merge every configured host against the discovered base addresses.
    ///
    /// Fails with a resolution error if any host requires a family the
    /// resolver found nothing for.
    pub fn plan(
        zone: &str,
        ttl: u32,
        hosts: &BTreeMap<String, PartialAddress>,
        discovered: &DiscoveredAddresses,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(hosts.len());
        for (host, partial) in hosts {
            let (base, record_type) = if partial.is_v4() {
                (discovered.ipv4.map(IpAddr::V4), RecordType::A)
            } else {
                (discovered.ipv6_prefix.map(IpAddr::V6), RecordType::Aaaa)
            };
            let base = base.ok_or_else(|| {
                Error::resolution(format!(
                    "host {host:?} needs an {} base address but none was discovered",
                    record_type.as_str(),
                ))
            })?;
            let addr = partial.merge(base)?;
            info!(host, %addr, record_type = record_type.as_str(), "planned record update");
            entries.push(FinalAddress {
                host: host.clone(),
                addr,
                record_type,
            });
        }
        Ok(Self {
            zone: zone.to_string(),
            ttl,
            entries,
            planned_at: Utc::now(),
        })
    }

    /// Fully-qualified owner name of a host within this batch's zone.
    pub fn fqdn(&self, host: &str) -> String {
        format!("{host}.{}", self.zone.trim_end_matches('.'))
    }
}
