//! Integration tests for the concurrent Azure batch: the whole fan-out
//! completes even when individual hosts fail, and per-host failures never
//! cancel their siblings.

use std::net::IpAddr;
use std::time::Duration;

use chrono::Utc;
use dnsup_core::batch::{FinalAddress, RecordType, UpdateBatch};
use dnsup_core::dispatch::UpdateDispatcher;
use dnsup_core::Error;
use dnsup_dispatch_azure::AzureDispatcher;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn batch(hosts: &[(&str, &str)]) -> UpdateBatch {
    let entries = hosts
        .iter()
        .map(|(host, addr)| {
            let addr: IpAddr = addr.parse().unwrap();
            FinalAddress {
                host: host.to_string(),
                record_type: if addr.is_ipv4() {
                    RecordType::A
                } else {
                    RecordType::Aaaa
                },
                addr,
            }
        })
        .collect();
    UpdateBatch {
        zone: "example.com".to_string(),
        ttl: 300,
        entries,
        planned_at: Utc::now(),
    }
}

fn dispatcher_for(server: &MockServer) -> AzureDispatcher {
    AzureDispatcher::new("app-id", "app-secret", "tenant", "sub", "dns-rg")
        .unwrap()
        .with_endpoints(server.uri(), server.uri())
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "access_token": "test-token" })),
        )
        .mount(server)
        .await;
}

fn record_path(record_type: &str, host: &str) -> String {
    format!(
        "/subscriptions/sub/resourceGroups/dns-rg/providers/Microsoft.Network/dnsZones/example.com/{record_type}/{host}"
    )
}

async fn mount_upsert(server: &MockServer, record_type: &str, host: &str, status: u16) {
    Mock::given(method("PUT"))
        .and(path(record_path(record_type, host)))
        .respond_with(ResponseTemplate::new(status))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn every_host_gets_one_upsert_and_the_batch_reports_clean() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_upsert(&server, "A", "router", 200).await;
    mount_upsert(&server, "AAAA", "nas", 200).await;

    let dispatcher = dispatcher_for(&server);
    let report = dispatcher
        .submit(&batch(&[("router", "1.2.3.9"), ("nas", "2001:db8::7")]))
        .await
        .unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.succeeded, 2);
}

#[tokio::test]
async fn one_failing_host_does_not_cancel_its_siblings() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_upsert(&server, "A", "a", 200).await;
    mount_upsert(&server, "A", "b", 500).await;
    mount_upsert(&server, "A", "c", 200).await;

    let dispatcher = dispatcher_for(&server);
    let hosts = [("a", "1.2.3.1"), ("b", "1.2.3.2"), ("c", "1.2.3.3")];

    // The join barrier must return even with a failure in the middle.
    let report = tokio::time::timeout(
        Duration::from_secs(10),
        dispatcher.submit(&batch(&hosts)),
    )
    .await
    .expect("batch must complete, not hang")
    .unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert!(!report.all_succeeded());
}

#[tokio::test]
async fn token_failure_is_fatal_before_any_upsert() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    // No PUT mocks mounted: an upsert attempt would fail the test through
    // the report rather than silently passing.

    let dispatcher = dispatcher_for(&server);
    let err = dispatcher
        .submit(&batch(&[("router", "1.2.3.9")]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
}
