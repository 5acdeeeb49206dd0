// # dnsup-core
//
// Core library for the dnsup dynamic DNS updater.
//
// ## Architecture Overview
//
// One run flows through four stages:
//
// - **resolver**: enumerate interfaces, pick the IPv4 base address and the
//   masked IPv6 prefix from the two named source interfaces
// - **partial**: per-host CIDR templates and the bitwise merge against a
//   discovered base address
// - **batch**: plan the full record set for the run (fatal if a required
//   base address is missing)
// - **dispatch**: the `UpdateDispatcher` trait; implementations live in the
//   `dnsup-dispatch-*` crates (signed RFC 2136 transaction, concurrent
//   Azure record API)
//
// The config/CLI layer is deliberately thin and lives in the `dnsupd`
// binary; this crate only consumes a validated `DnsupConfig`.

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod partial;
pub mod resolver;

// Re-export core types for convenience
pub use batch::{FinalAddress, RecordType, UpdateBatch};
pub use config::{DnsupConfig, TsigAlgorithmName, UpdateConfig};
pub use dispatch::{DispatchReport, UpdateDispatcher};
pub use error::{Error, Result};
pub use partial::PartialAddress;
pub use resolver::{DiscoveredAddresses, InterfaceAddr};
