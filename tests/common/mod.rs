// Common test utilities for integration tests
#![allow(dead_code)]

use ddnsbridge::dns::tsig::{Authenticator, KeyAlgorithm};
use ddnsbridge::dns::Handler;
use ddnsbridge::endpoint_store::InMemoryEndpointStore;
use ddnsbridge::reconciler::Reconciler;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::dnssec::rdata::DNSSECRData;
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const KEY_NAME: &str = "opnsense-ddns";
pub const SECRET: &[u8] = b"secret-secret-secret";
pub const NAMESPACE: &str = "dns";

pub fn authenticator() -> Authenticator {
    Authenticator::new(KEY_NAME, SECRET.to_vec(), KeyAlgorithm::HmacSha256, 300)
        .unwrap()
}

/// A handler for zone `example.com` writing to a fresh in-memory store.
pub fn bridge() -> (Handler, Arc<InMemoryEndpointStore>) {
    let store = Arc::new(InMemoryEndpointStore::default());
    let reconciler = Reconciler::new(
        store.clone(),
        NAMESPACE,
        BTreeMap::new(),
        Duration::from_secs(5),
    );
    let handler = Handler::new(authenticator(), vec!["example.com".to_string()], reconciler);
    (handler, store)
}

pub fn client_addr() -> SocketAddr {
    "192.168.1.254:53000".parse().unwrap()
}

pub fn name(s: &str) -> Name {
    Name::from_str(s).unwrap()
}

pub fn update(id: u16, zone: &str, records: Vec<Record>) -> Message {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update)
        .add_query(Query::query(name(zone), RecordType::SOA));
    for record in records {
        message.add_name_server(record);
    }
    message
}

pub fn a_record(fqdn: &str, ttl: u32, address: Ipv4Addr) -> Record {
    Record::from_rdata(name(fqdn), ttl, RData::A(A(address)))
}

pub fn aaaa_record(fqdn: &str, ttl: u32, address: Ipv6Addr) -> Record {
    Record::from_rdata(name(fqdn), ttl, RData::AAAA(AAAA(address)))
}

/// A record without data, as used by the delete forms of an update.
pub fn delete_record(fqdn: &str, record_type: RecordType, class: DNSClass) -> Record {
    let mut record = Record::with(name(fqdn), record_type, 0);
    record.set_dns_class(class);
    record
}

pub fn now() -> u64 {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    u64::try_from(now).unwrap()
}

/// Sign `message` the way a client would, returning the wire bytes and the request MAC.
pub fn sign(auth: &Authenticator, message: Message) -> (Vec<u8>, Vec<u8>) {
    let raw = auth.sign_at(message, None, now()).unwrap();
    let mac = tsig_mac(&Message::from_vec(&raw).unwrap()).unwrap();
    (raw, mac)
}

pub fn tsig_mac(message: &Message) -> Option<Vec<u8>> {
    message.signature().iter().find_map(|record| match record.data() {
        Some(RData::DNSSEC(DNSSECRData::TSIG(tsig))) => Some(tsig.mac().to_vec()),
        _ => None,
    })
}
