use super::*;
use crate::dns::tsig::KeyAlgorithm;
use crate::endpoint_store::InMemoryEndpointStore;
use hickory_proto::op::{MessageType, Query};
use hickory_proto::rr::{Name, RecordType};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

fn handler() -> (Handler, Arc<InMemoryEndpointStore>) {
    let store = Arc::new(InMemoryEndpointStore::default());
    let authenticator = Authenticator::new(
        "opnsense-ddns",
        b"secret-secret-secret".to_vec(),
        KeyAlgorithm::HmacSha256,
        300,
    )
    .unwrap();
    let reconciler = Reconciler::new(store.clone(), "dns", BTreeMap::new(), Duration::from_secs(5));
    (
        Handler::new(authenticator, vec!["example.com".to_string()], reconciler),
        store,
    )
}

fn src() -> SocketAddr {
    "192.0.2.10:5353".parse().unwrap()
}

#[test]
fn test_wire_header() {
    let header = WireHeader::read(&[0x12, 0x34, 0x29, 0x00, 0, 1, 0, 0, 0, 1, 0, 0]).unwrap();
    assert_eq!(header.id, 0x1234);
    assert!(!header.is_response);
    assert_eq!(header.op_code, OPCODE_UPDATE);
    assert!(header.recursion_desired);
    assert!(header.accepted());

    assert!(WireHeader::read(&[0x12, 0x34, 0x28]).is_none());
}

#[test]
fn test_wire_header_reply() {
    let header = WireHeader::read(&[0xab, 0xcd, 0x78, 0x00, 0, 1, 0, 0, 0, 0, 0, 0]).unwrap();
    assert!(!header.accepted());
    assert_eq!(
        header.reply(ResponseCode::NotImp),
        vec![0xab, 0xcd, 0xf8, 0x04, 0, 0, 0, 0, 0, 0, 0, 0]
    );
}

#[test]
fn test_status_codes() {
    let cases = [
        (ResponseStatus::NotImplemented, ResponseCode::NotImp),
        (ResponseStatus::NotAuth, ResponseCode::NotAuth),
        (ResponseStatus::FormatError, ResponseCode::FormErr),
        (ResponseStatus::Refused, ResponseCode::Refused),
        (ResponseStatus::ServerFailure, ResponseCode::ServFail),
        (ResponseStatus::Success, ResponseCode::NoError),
    ];
    for (status, code) in cases {
        let converted: ResponseCode = status.into();
        assert_eq!(converted, code, "{status:?}");
    }
}

#[tokio::test]
async fn test_truncated_header_dropped() {
    let (handler, _) = handler();
    assert!(handler.handle(Protocol::Udp, src(), &[0x12, 0x34, 0x28]).await.is_none());
    assert!(handler.handle(Protocol::Tcp, src(), &[]).await.is_none());
}

#[tokio::test]
async fn test_response_never_answered() {
    let (handler, _) = handler();
    let raw = [0x12, 0x34, 0xa8, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
    assert!(handler.handle(Protocol::Udp, src(), &raw).await.is_none());
}

#[tokio::test]
async fn test_unknown_opcode_not_implemented() {
    let (handler, store) = handler();

    // Opcode 2 (status).
    let raw = [0x00, 0x07, 0x10, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
    let reply = handler.handle(Protocol::Udp, src(), &raw).await.unwrap();
    let reply = Message::from_vec(&reply).unwrap();
    assert_eq!(reply.id(), 7);
    assert_eq!(reply.message_type(), MessageType::Response);
    assert_eq!(reply.op_code(), OpCode::Status);
    assert_eq!(reply.response_code(), ResponseCode::NotImp);

    // Unassigned opcode 15 is echoed back as is.
    let raw = [0x00, 0x08, 0x78, 0x00, 0, 1, 0, 0, 0, 0, 0, 0];
    let reply = handler.handle(Protocol::Udp, src(), &raw).await.unwrap();
    assert_eq!(reply, vec![0x00, 0x08, 0xf8, 0x04, 0, 0, 0, 0, 0, 0, 0, 0]);

    assert_eq!(store.mutations().await, 0);
}

#[tokio::test]
async fn test_query_not_implemented() {
    let (handler, _) = handler();
    let mut query = Message::new();
    query
        .set_id(42)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .add_query(Query::query(
            Name::from_str("router.example.com.").unwrap(),
            RecordType::A,
        ));

    let reply = handler
        .handle(Protocol::Udp, src(), &query.to_vec().unwrap())
        .await
        .unwrap();
    let reply = Message::from_vec(&reply).unwrap();
    assert_eq!(reply.id(), 42);
    assert_eq!(reply.response_code(), ResponseCode::NotImp);
    assert!(reply.signature().is_empty());
    assert_eq!(reply.queries(), query.queries());
}

#[tokio::test]
async fn test_undecodable_body_format_error() {
    let (handler, _) = handler();
    // Claims one zone entry but carries none.
    let raw = [0x12, 0x34, 0x28, 0x00, 0, 1, 0, 0, 0, 0, 0, 0];
    let reply = handler.handle(Protocol::Udp, src(), &raw).await.unwrap();
    assert_eq!(reply, vec![0x12, 0x34, 0xa8, 0x01, 0, 0, 0, 0, 0, 0, 0, 0]);
}
