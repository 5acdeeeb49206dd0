// # Azure DNS Dispatcher
//
// Publishes a batch through the Azure DNS record-set API: one PUT upsert
// per host, all requests in flight concurrently, joined on a task set.
//
// ## Failure model
//
// Per-host failures are logged and isolated; sibling requests keep running
// and the batch completes once every spawned task has resolved. Only
// authentication counts as fatal, since no request can proceed without a
// token.
//
// Known gap, preserved from the tool's original behavior: a run whose
// report contains per-host failures still exits successfully; operators
// must watch the logs. The report carries the counts for callers that want
// to do better.
//
// ## API Reference
//
// - Token: POST `{login}/{tenant}/oauth2/v2.0/token` (client credentials)
// - Upsert: PUT `.../dnsZones/{zone}/{A|AAAA}/{host}?api-version=2018-05-01`

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use dnsup_core::batch::{FinalAddress, UpdateBatch};
use dnsup_core::config::UpdateConfig;
use dnsup_core::dispatch::{DispatchReport, UpdateDispatcher};
use dnsup_core::{Error, Result};

/// Azure Resource Manager base URL
const AZURE_MANAGEMENT_BASE: &str = "https://management.azure.com";

/// Azure AD login base URL
const AZURE_LOGIN_BASE: &str = "https://login.microsoftonline.com";

/// HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// DNS record API version
const API_VERSION: &str = "2018-05-01";

/// Concurrent Azure DNS record updater.
pub struct AzureDispatcher {
    client: reqwest::Client,
    client_id: String,
    /// Service principal secret; never logged
    client_secret: String,
    tenant_id: String,
    subscription_id: String,
    resource_group: String,
    management_base: String,
    login_base: String,
}

// The client secret stays out of Debug output.
impl std::fmt::Debug for AzureDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureDispatcher")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<REDACTED>")
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .field("resource_group", &self.resource_group)
            .finish()
    }
}

impl AzureDispatcher {
    /// Create a dispatcher for one subscription/resource-group pair.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tenant_id: impl Into<String>,
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            tenant_id: tenant_id.into(),
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            management_base: AZURE_MANAGEMENT_BASE.to_string(),
            login_base: AZURE_LOGIN_BASE.to_string(),
        })
    }

    /// Build a dispatcher from the validated `azure` strategy section.
    pub fn from_config(update: &UpdateConfig) -> Result<Self> {
        let UpdateConfig::Azure {
            client_id,
            client_secret,
            tenant_id,
            subscription_id,
            resource_group,
        } = update
        else {
            return Err(Error::config(
                "azure dispatcher requires the azure update strategy",
            ));
        };
        Self::new(
            client_id,
            client_secret,
            tenant_id,
            subscription_id,
            resource_group,
        )
    }

    /// Point the dispatcher at alternative endpoints (test servers,
    /// sovereign clouds).
    pub fn with_endpoints(
        mut self,
        management_base: impl Into<String>,
        login_base: impl Into<String>,
    ) -> Self {
        self.management_base = management_base.into();
        self.login_base = login_base.into();
        self
    }

    /// Acquire a bearer token via the client-credentials flow.
    async fn acquire_token(&self) -> Result<String> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_base, self.tenant_id
        );
        let scope = format!("{}/.default", self.management_base);

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error response".to_string());
            return Err(Error::auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("cannot parse token response: {e}")))?;
        let token = json["access_token"]
            .as_str()
            .ok_or_else(|| Error::auth("token response has no access_token"))?;
        Ok(token.to_string())
    }

    /// Upsert one host's record set. Runs as an independent task; its error
    /// is this host's alone.
    async fn upsert_record(
        client: reqwest::Client,
        token: Arc<str>,
        url: String,
        entry: FinalAddress,
        ttl: u32,
    ) -> Result<()> {
        let properties = match entry.addr {
            IpAddr::V4(v4) => serde_json::json!({
                "TTL": ttl,
                "ARecords": [{ "ipv4Address": v4.to_string() }],
            }),
            IpAddr::V6(v6) => serde_json::json!({
                "TTL": ttl,
                "AAAARecords": [{ "ipv6Address": v6.to_string() }],
            }),
        };

        debug!(host = %entry.host, addr = %entry.addr, "upserting record set");
        let response = client
            .put(&url)
            .bearer_auth(token.as_ref())
            .json(&serde_json::json!({ "properties": properties }))
            .send()
            .await
            .map_err(|e| Error::provider(entry.host.as_str(), format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            info!(
                host = %entry.host,
                addr = %entry.addr,
                record_type = entry.record_type.as_str(),
                "record set updated"
            );
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error response".to_string());
        let message = match status.as_u16() {
            401 | 403 => format!(
                "authentication failed: invalid credentials or insufficient permissions ({status})"
            ),
            429 => format!("rate limit exceeded ({status})"),
            500..=599 => format!("Azure server error (transient): {status} - {body}"),
            _ => format!("record upsert failed: {status} - {body}"),
        };
        Err(Error::provider(entry.host.as_str(), message))
    }

    fn record_url(&self, batch: &UpdateBatch, entry: &FinalAddress) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/dnsZones/{}/{}/{}?api-version={}",
            self.management_base,
            self.subscription_id,
            self.resource_group,
            batch.zone.trim_end_matches('.'),
            entry.record_type.as_str(),
            entry.host,
            API_VERSION,
        )
    }
}

#[async_trait]
impl UpdateDispatcher for AzureDispatcher {
    /// Submit every host's upsert concurrently and wait for all of them.
    ///
    /// Fan-out is unbounded on purpose: the host count is bounded by the
    /// configuration file, not by external input.
    async fn submit(&self, batch: &UpdateBatch) -> Result<DispatchReport> {
        let token: Arc<str> = Arc::from(self.acquire_token().await?);

        info!(
            zone = %batch.zone,
            hosts = batch.entries.len(),
            "dispatching concurrent record upserts"
        );

        let mut tasks = JoinSet::new();
        for entry in batch.entries.iter().cloned() {
            let client = self.client.clone();
            let token = Arc::clone(&token);
            let url = self.record_url(batch, &entry);
            let ttl = batch.ttl;
            tasks.spawn(Self::upsert_record(client, token, url, entry, ttl));
        }

        // Every spawned task is drained here, success or failure: the run
        // never reports completion with requests still in flight.
        let mut report = DispatchReport::clean(0);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => report.succeeded += 1,
                Ok(Err(e)) => {
                    error!("{e}");
                    report.failed += 1;
                }
                Err(e) => {
                    error!("record upsert task panicked: {e}");
                    report.failed += 1;
                }
            }
        }

        if !report.all_succeeded() {
            warn!(
                failed = report.failed,
                succeeded = report.succeeded,
                "batch completed with per-host failures; the exit status will not reflect them"
            );
        }
        Ok(report)
    }

    fn name(&self) -> &'static str {
        "azure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> AzureDispatcher {
        AzureDispatcher::new("app-id", "app-secret", "tenant", "sub", "dns-rg").unwrap()
    }

    #[test]
    fn from_config_rejects_other_strategies() {
        let update = UpdateConfig::Rfc2136 {
            server: "203.0.113.53:53".to_string(),
            key_name: "k".to_string(),
            keys: Default::default(),
            algorithm: Default::default(),
            tcp: false,
        };
        assert!(matches!(
            AzureDispatcher::from_config(&update),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn client_secret_is_not_exposed_in_debug() {
        let debug = format!("{:?}", dispatcher());
        assert!(debug.contains("<REDACTED>"));
        assert!(!debug.contains("app-secret"));
    }

    #[test]
    fn record_urls_name_the_zone_type_and_host() {
        let batch = UpdateBatch {
            zone: "example.com.".to_string(),
            ttl: 300,
            entries: Vec::new(),
            planned_at: chrono::Utc::now(),
        };
        let entry = FinalAddress {
            host: "router".to_string(),
            addr: "1.2.3.9".parse().unwrap(),
            record_type: dnsup_core::batch::RecordType::A,
        };
        let url = dispatcher().record_url(&batch, &entry);
        assert_eq!(
            url,
            "https://management.azure.com/subscriptions/sub/resourceGroups/dns-rg/providers/Microsoft.Network/dnsZones/example.com/A/router?api-version=2018-05-01"
        );
    }
}
