//! Configuration types for the dnsup system
//!
//! The configuration file is YAML, mapping per-host names to partial
//! addresses and selecting one of the two update strategies.
//!
//! ```yaml
//! zone: example.com
//! ttl: 300
//! hosts:
//!   router: 0.0.0.9/24
//!   nas: ::1234:1234:1234:1234/64
//! update:
//!   strategy: rfc2136
//!   server: "203.0.113.53:53"
//!   key_name: dnsup-key
//!   keys:
//!     dnsup-key: "c2VjcmV0Cg=="
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::partial::PartialAddress;

fn default_ttl() -> u32 {
    300
}

/// Main dnsup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsupConfig {
    /// Zone all managed records live in
    pub zone: String,

    /// TTL applied to every published record
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Per-host partial addresses, keyed by owner name relative to the zone.
    ///
    /// A BTreeMap keeps planning order deterministic across runs.
    pub hosts: BTreeMap<String, PartialAddress>,

    /// Update-dispatch strategy
    pub update: UpdateConfig,
}

impl DnsupConfig {
    /// Load and validate a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Parse and validate configuration from a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.zone.is_empty() {
            return Err(Error::config("zone cannot be empty"));
        }
        if self.ttl == 0 {
            return Err(Error::config("ttl must be greater than zero"));
        }
        if self.hosts.is_empty() {
            return Err(Error::config("no hosts configured"));
        }
        for host in self.hosts.keys() {
            if host.is_empty() {
                return Err(Error::config("host names cannot be empty"));
            }
        }
        self.update.validate()
    }
}

/// Update-dispatch strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum UpdateConfig {
    /// Signed DNS UPDATE transaction against an authoritative server
    Rfc2136 {
        /// Server endpoint, `host:port`
        server: String,
        /// TSIG key name used to sign the transaction
        key_name: String,
        /// Key-name to base64-secret mapping
        keys: HashMap<String, String>,
        /// HMAC algorithm for the TSIG signature
        #[serde(default)]
        algorithm: TsigAlgorithmName,
        /// Exchange over TCP instead of UDP
        #[serde(default)]
        tcp: bool,
    },

    /// Concurrent record upserts against the Azure DNS API
    Azure {
        /// Service principal client id
        client_id: String,
        /// Service principal client secret
        client_secret: String,
        /// Azure AD tenant id
        tenant_id: String,
        /// Subscription the DNS zone lives in
        subscription_id: String,
        /// Resource group holding the zone
        resource_group: String,
    },
}

impl UpdateConfig {
    /// Validate the strategy configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            UpdateConfig::Rfc2136 {
                server,
                key_name,
                keys,
                ..
            } => {
                if server.is_empty() {
                    return Err(Error::config("rfc2136 server endpoint cannot be empty"));
                }
                if key_name.is_empty() {
                    return Err(Error::config("rfc2136 key_name cannot be empty"));
                }
                if !keys.contains_key(key_name) {
                    return Err(Error::config(format!(
                        "rfc2136 keys map has no secret for key {key_name:?}"
                    )));
                }
                Ok(())
            }
            UpdateConfig::Azure {
                client_id,
                client_secret,
                tenant_id,
                subscription_id,
                resource_group,
            } => {
                for (value, name) in [
                    (client_id, "client_id"),
                    (client_secret, "client_secret"),
                    (tenant_id, "tenant_id"),
                    (subscription_id, "subscription_id"),
                    (resource_group, "resource_group"),
                ] {
                    if value.is_empty() {
                        return Err(Error::config(format!("azure {name} cannot be empty")));
                    }
                }
                Ok(())
            }
        }
    }

    /// Get the strategy name (for logging)
    pub fn strategy_name(&self) -> &'static str {
        match self {
            UpdateConfig::Rfc2136 { .. } => "rfc2136",
            UpdateConfig::Azure { .. } => "azure",
        }
    }
}

/// TSIG HMAC algorithm selection.
///
/// Defaults to HMAC-SHA256. The legacy digest names (MD5, SHA-1, SHA-224)
/// still parse so old key files keep loading, but the signing backend
/// rejects them; only the SHA-2 family can sign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TsigAlgorithmName {
    /// HMAC-MD5 (legacy; cannot sign)
    HmacMd5,
    /// HMAC-SHA1 (legacy; cannot sign)
    HmacSha1,
    /// HMAC-SHA224 (legacy; cannot sign)
    HmacSha224,
    /// HMAC-SHA256
    #[default]
    HmacSha256,
    /// HMAC-SHA384
    HmacSha384,
    /// HMAC-SHA512
    HmacSha512,
}

impl TsigAlgorithmName {
    /// Configuration-file spelling of the algorithm name
    pub fn as_str(&self) -> &'static str {
        match self {
            TsigAlgorithmName::HmacMd5 => "hmac-md5",
            TsigAlgorithmName::HmacSha1 => "hmac-sha1",
            TsigAlgorithmName::HmacSha224 => "hmac-sha224",
            TsigAlgorithmName::HmacSha256 => "hmac-sha256",
            TsigAlgorithmName::HmacSha384 => "hmac-sha384",
            TsigAlgorithmName::HmacSha512 => "hmac-sha512",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC2136_YAML: &str = r#"
zone: example.com
ttl: 120
hosts:
  router: 0.0.0.9/24
  nas: "::1234:1234:1234:1234/64"
update:
  strategy: rfc2136
  server: "203.0.113.53:53"
  key_name: dnsup-key
  keys:
    dnsup-key: "c2VjcmV0Cg=="
  algorithm: hmac-sha256
"#;

    const AZURE_YAML: &str = r#"
zone: example.com
hosts:
  router: 0.0.0.9/24
update:
  strategy: azure
  client_id: app-id
  client_secret: app-secret
  tenant_id: tenant
  subscription_id: sub
  resource_group: dns-rg
"#;

    #[test]
    fn rfc2136_config_parses() {
        let config = DnsupConfig::from_yaml(RFC2136_YAML).unwrap();
        assert_eq!(config.zone, "example.com");
        assert_eq!(config.ttl, 120);
        assert_eq!(config.hosts.len(), 2);
        assert!(config.hosts["router"].is_v4());
        assert!(!config.hosts["nas"].is_v4());
        match &config.update {
            UpdateConfig::Rfc2136 {
                server, algorithm, tcp, ..
            } => {
                assert_eq!(server, "203.0.113.53:53");
                assert_eq!(*algorithm, TsigAlgorithmName::HmacSha256);
                assert!(!tcp);
            }
            other => panic!("expected rfc2136 strategy, got {}", other.strategy_name()),
        }
    }

    #[test]
    fn tsig_algorithm_defaults_to_sha256() {
        let yaml = RFC2136_YAML.replace("  algorithm: hmac-sha256\n", "");
        let config = DnsupConfig::from_yaml(&yaml).unwrap();
        match &config.update {
            UpdateConfig::Rfc2136 { algorithm, .. } => {
                assert_eq!(*algorithm, TsigAlgorithmName::HmacSha256);
                assert_eq!(algorithm.as_str(), "hmac-sha256");
            }
            other => panic!("expected rfc2136 strategy, got {}", other.strategy_name()),
        }
    }

    #[test]
    fn azure_config_parses_with_default_ttl() {
        let config = DnsupConfig::from_yaml(AZURE_YAML).unwrap();
        assert_eq!(config.ttl, 300);
        assert_eq!(config.update.strategy_name(), "azure");
    }

    #[test]
    fn bad_cidr_literal_is_a_config_error() {
        let yaml = AZURE_YAML.replace("0.0.0.9/24", "0.0.0.9/40");
        assert!(matches!(
            DnsupConfig::from_yaml(&yaml),
            Err(Error::Yaml(_) | Error::Config(_))
        ));
    }

    #[test]
    fn empty_hosts_are_rejected() {
        let yaml = r#"
zone: example.com
hosts: {}
update:
  strategy: azure
  client_id: a
  client_secret: b
  tenant_id: c
  subscription_id: d
  resource_group: e
"#;
        assert!(matches!(
            DnsupConfig::from_yaml(yaml),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn missing_tsig_secret_is_rejected() {
        let yaml = RFC2136_YAML.replace("dnsup-key: \"c2VjcmV0Cg==\"", "other-key: \"YWJjCg==\"");
        assert!(matches!(
            DnsupConfig::from_yaml(&yaml),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn from_path_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dnsup.yml");
        std::fs::write(&path, AZURE_YAML).unwrap();
        let config = DnsupConfig::from_path(&path).unwrap();
        assert_eq!(config.zone, "example.com");

        let missing = DnsupConfig::from_path(dir.path().join("absent.yml"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }

    #[test]
    fn config_survives_a_yaml_round_trip() {
        let config = DnsupConfig::from_yaml(RFC2136_YAML).unwrap();
        let rendered = serde_yaml::to_string(&config).unwrap();
        let reparsed = DnsupConfig::from_yaml(&rendered).unwrap();
        assert_eq!(reparsed.hosts["router"].to_string(), "0.0.0.9/24");
        assert_eq!(reparsed.zone, config.zone);
    }
}
