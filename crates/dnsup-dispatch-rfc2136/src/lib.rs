// # RFC 2136 Update Dispatcher
//
// Builds one TSIG-signed DNS UPDATE transaction for the whole batch and
// exchanges it synchronously with the authoritative server.
//
// ## Transaction shape
//
// Per host, in order: a class-ANY type-ANY record that clears all prior
// records for the owner name, then the new A or AAAA record with the batch
// TTL. After all hosts, one TXT record at the zone apex carries the batch
// timestamp as a crude freshness marker. N hosts therefore produce exactly
// 2N + 1 update records.
//
// ## Failure model
//
// Single-shot, all-or-nothing: any transport error or non-NoError response
// code is fatal for the run. The raw server reply is logged before failing.
// RFC 2136 makes the whole UPDATE atomic on compliant servers; that is a
// property of the server, not something this client can verify.
//
// There is no deadline beyond the transport's own: the TSIG fudge window
// bounds signature validity, not the network exchange.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use tracing::{debug, error, info};

use hickory_client::client::{Client, ClientConnection, SyncClient};
use hickory_client::proto::op::update_message::UpdateMessage;
use hickory_client::proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_client::proto::rr::rdata::TXT;
use hickory_client::proto::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_client::proto::xfer::{DnsRequest, DnsRequestOptions, DnsResponse};
use hickory_client::rr::rdata::tsig::TsigAlgorithm;
use hickory_client::tcp::TcpClientConnection;
use hickory_client::udp::UdpClientConnection;
use hickory_proto::rr::dnssec::tsig::TSigner;

use dnsup_core::batch::UpdateBatch;
use dnsup_core::config::{TsigAlgorithmName, UpdateConfig};
use dnsup_core::dispatch::{DispatchReport, UpdateDispatcher};
use dnsup_core::{Error, Result};

/// TSIG signature validity window in seconds
const TSIG_FUDGE_SECS: u16 = 300;

/// Signed-update dispatcher for one authoritative server.
pub struct Rfc2136Dispatcher {
    server: SocketAddr,
    key_name: String,
    /// Decoded TSIG secret; never logged
    secret: Vec<u8>,
    algorithm: TsigAlgorithmName,
    tcp: bool,
}

// The TSIG secret stays out of Debug output.
impl std::fmt::Debug for Rfc2136Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rfc2136Dispatcher")
            .field("server", &self.server)
            .field("key_name", &self.key_name)
            .field("secret", &"<REDACTED>")
            .field("algorithm", &self.algorithm)
            .field("tcp", &self.tcp)
            .finish()
    }
}

impl Rfc2136Dispatcher {
    /// Build a dispatcher from the validated `rfc2136` strategy section.
    ///
    /// Resolves the server endpoint and the configured key's base64 secret
    /// up front so submission can fail only on the wire.
    pub fn from_config(update: &UpdateConfig) -> Result<Self> {
        let UpdateConfig::Rfc2136 {
            server,
            key_name,
            keys,
            algorithm,
            tcp,
        } = update
        else {
            return Err(Error::config(
                "rfc2136 dispatcher requires the rfc2136 update strategy",
            ));
        };

        let server = server
            .to_socket_addrs()
            .map_err(|e| Error::config(format!("cannot resolve server endpoint {server:?}: {e}")))?
            .next()
            .ok_or_else(|| {
                Error::config(format!("server endpoint {server:?} resolved to no address"))
            })?;

        let encoded = keys.get(key_name).ok_or_else(|| {
            Error::config(format!("no TSIG secret configured for key {key_name:?}"))
        })?;
        let secret = BASE64
            .decode(encoded)
            .map_err(|e| Error::config(format!("TSIG secret for {key_name:?} is not base64: {e}")))?;

        // Fail on an unsignable algorithm now, not at submit time.
        tsig_algorithm(*algorithm)?;

        Ok(Self {
            server,
            key_name: key_name.clone(),
            secret,
            algorithm: *algorithm,
            tcp: *tcp,
        })
    }

    fn signer(&self) -> Result<TSigner> {
        let algorithm = tsig_algorithm(self.algorithm)?;
        let name = Name::from_str(&self.key_name)
            .map_err(|e| Error::config(format!("invalid TSIG key name {:?}: {e}", self.key_name)))?;
        TSigner::new(self.secret.clone(), algorithm, name, TSIG_FUDGE_SECS)
            .map_err(|e| Error::config(format!("cannot create TSIG signer: {e}")))
    }
}

/// Map a configured algorithm name to a signable hickory algorithm.
///
/// The ring-backed signer only implements the SHA-2 family; the legacy
/// digest names stay parseable for config compatibility but are rejected
/// here with the supported set spelled out.
fn tsig_algorithm(name: TsigAlgorithmName) -> Result<TsigAlgorithm> {
    match name {
        TsigAlgorithmName::HmacSha256 => Ok(TsigAlgorithm::HmacSha256),
        TsigAlgorithmName::HmacSha384 => Ok(TsigAlgorithm::HmacSha384),
        TsigAlgorithmName::HmacSha512 => Ok(TsigAlgorithm::HmacSha512),
        unsupported => Err(Error::config(format!(
            "TSIG algorithm {} cannot be used for signing; supported algorithms are \
             hmac-sha256, hmac-sha384, and hmac-sha512",
            unsupported.as_str(),
        ))),
    }
}

/// Build the complete UPDATE message for one batch.
///
/// The zone section names the batch's zone; the update section holds, per
/// host, the delete-ANY record followed by the new address record, and
/// finally the apex freshness TXT.
pub fn build_update(batch: &UpdateBatch) -> Result<Message> {
    let zone = Name::from_str(&batch.zone)
        .map_err(|e| Error::invalid_input(format!("invalid zone name {:?}: {e}", batch.zone)))?;

    let mut message = Message::new();
    message
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update)
        .set_recursion_desired(false);

    let mut zone_query = Query::new();
    zone_query
        .set_name(zone.clone())
        .set_query_class(DNSClass::IN)
        .set_query_type(RecordType::SOA);
    message.add_zone(zone_query);

    for entry in &batch.entries {
        let fqdn = batch.fqdn(&entry.host);
        let owner = Name::from_str(&fqdn)
            .map_err(|e| Error::invalid_input(format!("invalid owner name {fqdn:?}: {e}")))?;

        // Clear all prior records for the owner name, then add the new one.
        let mut delete = Record::with(owner.clone(), RecordType::ANY, 0);
        delete.set_dns_class(DNSClass::ANY);
        message.add_update(delete);

        let rdata = match entry.addr {
            IpAddr::V4(v4) => RData::A(v4.into()),
            IpAddr::V6(v6) => RData::AAAA(v6.into()),
        };
        let mut add = Record::from_rdata(owner, batch.ttl, rdata);
        add.set_dns_class(DNSClass::IN);
        message.add_update(add);
    }

    // Freshness marker at the zone apex.
    let txt = TXT::new(vec![batch.planned_at.to_rfc3339()]);
    let mut marker = Record::from_rdata(zone, batch.ttl, RData::TXT(txt));
    marker.set_dns_class(DNSClass::IN);
    message.add_update(marker);

    Ok(message)
}

fn send_signed<CC: ClientConnection>(
    conn: CC,
    signer: TSigner,
    request: DnsRequest,
) -> Result<DnsResponse> {
    let client = SyncClient::with_tsigner(conn, signer);
    match client.send(request).into_iter().next() {
        Some(Ok(response)) => Ok(response),
        Some(Err(e)) => Err(Error::transport(format!("update exchange failed: {e}"))),
        None => Err(Error::transport("no response from server")),
    }
}

fn exchange(server: SocketAddr, tcp: bool, signer: TSigner, message: Message) -> Result<DnsResponse> {
    let request = DnsRequest::new(message, DnsRequestOptions::default());
    if tcp {
        let conn = TcpClientConnection::new(server)
            .map_err(|e| Error::transport(format!("cannot open TCP connection: {e}")))?;
        send_signed(conn, signer, request)
    } else {
        let conn = UdpClientConnection::new(server)
            .map_err(|e| Error::transport(format!("cannot open UDP connection: {e}")))?;
        send_signed(conn, signer, request)
    }
}

#[async_trait]
impl UpdateDispatcher for Rfc2136Dispatcher {
    async fn submit(&self, batch: &UpdateBatch) -> Result<DispatchReport> {
        let message = build_update(batch)?;
        let signer = self.signer()?;
        let record_count = batch.entries.len();
        let server = self.server;
        let tcp = self.tcp;

        info!(
            server = %server,
            zone = %batch.zone,
            hosts = record_count,
            "sending signed update transaction"
        );

        // hickory's synchronous client drives its own runtime internally.
        let response = tokio::task::spawn_blocking(move || exchange(server, tcp, signer, message))
            .await
            .map_err(|e| Error::transport(format!("signed update task failed: {e}")))??;

        debug!(reply = ?response, "authoritative server reply");
        match response.response_code() {
            ResponseCode::NoError => {
                info!(zone = %batch.zone, hosts = record_count, "update transaction accepted");
                Ok(DispatchReport::clean(record_count))
            }
            code => {
                error!(reply = ?response, "authoritative server rejected update");
                Err(Error::transport(format!(
                    "server returned {code} for the update transaction"
                )))
            }
        }
    }

    fn name(&self) -> &'static str {
        "rfc2136"
    }
}
