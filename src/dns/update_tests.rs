use super::*;
use hickory_proto::op::{MessageType, Query};
use hickory_proto::rr::rdata::{A, AAAA, TXT};
use hickory_proto::rr::Name;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

fn name(s: &str) -> Name {
    Name::from_str(s).unwrap()
}

fn update(zone: Option<&str>, records: Vec<Record>) -> Message {
    let mut message = Message::new();
    message
        .set_id(7)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update);
    if let Some(zone) = zone {
        message.add_query(Query::query(name(zone), RecordType::SOA));
    }
    for record in records {
        message.add_name_server(record);
    }
    // Round trip through the wire format, as the dispatcher sees it.
    Message::from_vec(&message.to_vec().unwrap()).unwrap()
}

fn a_record(fqdn: &str, ttl: u32, class: DNSClass) -> Record {
    let mut record = Record::from_rdata(
        name(fqdn),
        ttl,
        RData::A(A(Ipv4Addr::new(192, 168, 1, 1))),
    );
    record.set_dns_class(class);
    record
}

fn empty_record(fqdn: &str, record_type: RecordType, class: DNSClass) -> Record {
    let mut record = Record::with(name(fqdn), record_type, 0);
    record.set_dns_class(class);
    record
}

#[test]
fn test_upsert_a_record() {
    let message = update(
        Some("example.com."),
        vec![a_record("router.example.com.", 300, DNSClass::IN)],
    );
    let intents = parse(&message).unwrap();
    assert_eq!(
        intents,
        vec![RecordChangeIntent {
            kind: ChangeKind::Upsert {
                address: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)),
                ttl: 300,
            },
            record_type: AddressType::A,
            name: "router.example.com.".to_string(),
            zone: "example.com.".to_string(),
        }]
    );
    assert_eq!(intents[0].ttl(), 300);
    assert_eq!(
        intents[0].address(),
        Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)))
    );
}

#[test]
fn test_upsert_aaaa_record() {
    let address = Ipv6Addr::from_str("2001:db8::1").unwrap();
    let record = Record::from_rdata(name("host.example.com."), 600, RData::AAAA(AAAA(address)));
    let intents = parse(&update(Some("example.com."), vec![record])).unwrap();
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].record_type, AddressType::AAAA);
    assert_eq!(
        intents[0].kind,
        ChangeKind::Upsert {
            address: IpAddr::V6(address),
            ttl: 600
        }
    );
}

#[test]
fn test_class_any_deletes_all_of_type() {
    let message = update(
        Some("example.com."),
        vec![empty_record("router.example.com.", RecordType::A, DNSClass::ANY)],
    );
    let intents = parse(&message).unwrap();
    assert_eq!(intents[0].kind, ChangeKind::DeleteAllOfType);
    assert_eq!(intents[0].address(), None);
}

#[test]
fn test_class_none_deletes_record() {
    let mut record = a_record("router.example.com.", 0, DNSClass::NONE);
    record.set_ttl(0);
    let intents = parse(&update(Some("example.com."), vec![record])).unwrap();
    assert_eq!(intents[0].kind, ChangeKind::DeleteRecord);
    assert_eq!(intents[0].record_type, AddressType::A);
    assert_eq!(intents[0].address(), None);
}

#[test]
fn test_class_in_with_zero_ttl_deletes_record() {
    let message = update(
        Some("example.com."),
        vec![a_record("router.example.com.", 0, DNSClass::IN)],
    );
    let intents = parse(&message).unwrap();
    assert_eq!(intents[0].kind, ChangeKind::DeleteRecord);
    assert_eq!(intents[0].ttl(), 0);
}

#[test]
fn test_unsupported_class_is_skipped() {
    let message = update(
        Some("example.com."),
        vec![
            a_record("chaos.example.com.", 300, DNSClass::CH),
            a_record("router.example.com.", 300, DNSClass::IN),
        ],
    );
    let intents = parse(&message).unwrap();
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].name, "router.example.com.");
}

#[test]
fn test_order_is_preserved() {
    let message = update(
        Some("example.com."),
        vec![
            empty_record("router.example.com.", RecordType::A, DNSClass::ANY),
            a_record("router.example.com.", 300, DNSClass::IN),
        ],
    );
    let intents = parse(&message).unwrap();
    assert_eq!(intents[0].kind, ChangeKind::DeleteAllOfType);
    assert!(matches!(intents[1].kind, ChangeKind::Upsert { .. }));
}

#[test]
fn test_only_irrelevant_types_is_an_error() {
    let txt = Record::from_rdata(
        name("txt.example.com."),
        300,
        RData::TXT(TXT::new(vec!["hello".to_string()])),
    );
    let message = update(Some("example.com."), vec![txt]);
    assert_eq!(parse(&message), Err(ParseError::NoAddressUpdates));
}

#[test]
fn test_empty_update_section_is_an_error() {
    let message = update(Some("example.com."), vec![]);
    assert_eq!(parse(&message), Err(ParseError::NoAddressUpdates));
}

#[test]
fn test_missing_zone_section() {
    let message = update(None, vec![a_record("router.example.com.", 300, DNSClass::IN)]);
    assert_eq!(parse(&message), Err(ParseError::MissingZone));
}

#[test]
fn test_not_an_update() {
    let mut message = update(Some("example.com."), vec![]);
    message.set_op_code(OpCode::Query);
    assert_eq!(parse(&message), Err(ParseError::NotUpdate(OpCode::Query)));
}

#[test]
fn test_upsert_without_address_is_skipped() {
    let mut bad = Record::with(name("nas.example.com."), RecordType::AAAA, 300);
    bad.set_dns_class(DNSClass::IN);
    let message = update(
        Some("example.com."),
        vec![a_record("router.example.com.", 300, DNSClass::IN), bad],
    );
    let intents = parse(&message).unwrap();
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].name, "router.example.com.");
    assert_eq!(intents[0].record_type, AddressType::A);
}

#[test]
fn test_only_upserts_without_address_is_no_updates() {
    let mut record = Record::with(name("router.example.com."), RecordType::A, 300);
    record.set_dns_class(DNSClass::IN);
    let mut message = Message::new();
    message.set_op_code(OpCode::Update);
    message.add_query(Query::query(name("example.com."), RecordType::SOA));
    message.add_name_server(record);
    assert_eq!(parse(&message), Err(ParseError::NoAddressUpdates));
}

#[test]
fn test_intent_display() {
    let intent = RecordChangeIntent {
        kind: ChangeKind::Upsert {
            address: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            ttl: 60,
        },
        record_type: AddressType::A,
        name: "nas.example.com.".to_string(),
        zone: "example.com.".to_string(),
    };
    assert_eq!(intent.to_string(), "UPSERT A nas.example.com. -> 10.0.0.1 (TTL: 60)");
}
