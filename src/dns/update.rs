//! Translation of the RFC 2136 update section into record change intents.
//!
//! | class  | TTL | intent                                   |
//! |--------|-----|------------------------------------------|
//! | `ANY`  |  -  | [`ChangeKind::DeleteAllOfType`]          |
//! | `NONE` |  -  | [`ChangeKind::DeleteRecord`]             |
//! | `IN`   |  0  | [`ChangeKind::DeleteRecord`]             |
//! | `IN`   | > 0 | [`ChangeKind::Upsert`] with address + TTL |
//!
//! Records of any other class are skipped, as are records that aren't `A` or `AAAA`.

use hickory_proto::op::{Message, OpCode};
use hickory_proto::rr::{DNSClass, RData, Record, RecordType};
use std::fmt;
use std::net::IpAddr;
use tracing::{debug, warn};

/// The address record types the bridge manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    A,
    AAAA,
}

impl AddressType {
    pub fn from_record_type(record_type: RecordType) -> Option<Self> {
        match record_type {
            RecordType::A => Some(AddressType::A),
            RecordType::AAAA => Some(AddressType::AAAA),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AddressType::A => "A",
            AddressType::AAAA => "AAAA",
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single update record asks for. Only an upsert carries an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Upsert { address: IpAddr, ttl: u32 },
    DeleteRecord,
    DeleteAllOfType,
}

/// One normalized change from the update section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChangeIntent {
    pub kind: ChangeKind,
    pub record_type: AddressType,
    /// Fully qualified record name, with its trailing dot.
    pub name: String,
    /// The zone from the request's zone section.
    pub zone: String,
}

impl RecordChangeIntent {
    pub fn address(&self) -> Option<IpAddr> {
        match self.kind {
            ChangeKind::Upsert { address, .. } => Some(address),
            ChangeKind::DeleteRecord | ChangeKind::DeleteAllOfType => None,
        }
    }

    pub fn ttl(&self) -> u32 {
        match self.kind {
            ChangeKind::Upsert { ttl, .. } => ttl,
            ChangeKind::DeleteRecord | ChangeKind::DeleteAllOfType => 0,
        }
    }
}

impl fmt::Display for RecordChangeIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ChangeKind::Upsert { address, ttl } => write!(
                f,
                "UPSERT {} {} -> {address} (TTL: {ttl})",
                self.record_type, self.name
            ),
            ChangeKind::DeleteRecord => write!(f, "DELETE {} {}", self.record_type, self.name),
            ChangeKind::DeleteAllOfType => {
                write!(f, "DELETE-ALL {} {}", self.record_type, self.name)
            }
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("not a DNS UPDATE message (opcode: {0:?})")]
    NotUpdate(OpCode),

    #[error("UPDATE message has no zone section")]
    MissingZone,

    #[error("no valid address-record updates found")]
    NoAddressUpdates,
}

/// Parse the update section of `message` into change intents, in message order.
///
/// # Errors
///
/// Returns [`ParseError::NotUpdate`] or [`ParseError::MissingZone`] when the preconditions
/// aren't met, and [`ParseError::NoAddressUpdates`] when no record was usable. Records that
/// can't be used, including upserts without a valid address, are skipped.
pub fn parse(message: &Message) -> Result<Vec<RecordChangeIntent>, ParseError> {
    if message.op_code() != OpCode::Update {
        return Err(ParseError::NotUpdate(message.op_code()));
    }
    let zone = message
        .queries()
        .first()
        .ok_or(ParseError::MissingZone)?
        .name()
        .to_string();

    let mut intents = Vec::with_capacity(message.name_servers().len());
    for record in message.name_servers() {
        if let Some(intent) = parse_record(record, &zone) {
            debug!("parsed update: {intent}");
            intents.push(intent);
        }
    }

    if intents.is_empty() {
        return Err(ParseError::NoAddressUpdates);
    }
    Ok(intents)
}

fn parse_record(record: &Record, zone: &str) -> Option<RecordChangeIntent> {
    let Some(record_type) = AddressType::from_record_type(record.record_type()) else {
        debug!("skipping {} record {}", record.record_type(), record.name());
        return None;
    };
    let name = record.name().to_string();

    let kind = match record.dns_class() {
        DNSClass::ANY => ChangeKind::DeleteAllOfType,
        DNSClass::NONE => ChangeKind::DeleteRecord,
        DNSClass::IN if record.ttl() == 0 => ChangeKind::DeleteRecord,
        DNSClass::IN => {
            let Some(address) = address_of(record, record_type) else {
                warn!("skipping {record_type} record {name} without a valid address");
                return None;
            };
            ChangeKind::Upsert {
                address,
                ttl: record.ttl(),
            }
        }
        class => {
            warn!("skipping {record_type} record {name} with unsupported class {class}");
            return None;
        }
    };

    Some(RecordChangeIntent {
        kind,
        record_type,
        name,
        zone: zone.to_string(),
    })
}

fn address_of(record: &Record, record_type: AddressType) -> Option<IpAddr> {
    match (record_type, record.data()?) {
        (AddressType::A, RData::A(a)) => Some(IpAddr::V4(a.0)),
        (AddressType::AAAA, RData::AAAA(aaaa)) => Some(IpAddr::V6(aaaa.0)),
        _ => None,
    }
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod update_tests;
