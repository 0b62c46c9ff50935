use crate::config::{is_zone_allowed, Config};
use crate::dns::tsig::{AuthContext, AuthError, Authenticator};
use crate::dns::update;
use crate::endpoint_store::DynEndpointStore;
use crate::error::Error;
use crate::reconciler::Reconciler;
use hickory_proto::op::{Message, OpCode, ResponseCode};
use std::fmt;
use std::net::SocketAddr;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Length of the fixed DNS message header.
const HEADER_LEN: usize = 12;

// Wire values of the opcodes that are decoded further.
const OPCODE_QUERY: u8 = 0;
const OPCODE_NOTIFY: u8 = 4;
const OPCODE_UPDATE: u8 = 5;

/// The transport a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Udp,
    Tcp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Udp => f.write_str("udp"),
            Protocol::Tcp => f.write_str("tcp"),
        }
    }
}

/// The outcomes an update can be answered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    NotImplemented,
    NotAuth,
    FormatError,
    Refused,
    ServerFailure,
    Success,
}

impl From<ResponseStatus> for ResponseCode {
    fn from(status: ResponseStatus) -> Self {
        match status {
            ResponseStatus::NotImplemented => ResponseCode::NotImp,
            ResponseStatus::NotAuth => ResponseCode::NotAuth,
            ResponseStatus::FormatError => ResponseCode::FormErr,
            ResponseStatus::Refused => ResponseCode::Refused,
            ResponseStatus::ServerFailure => ResponseCode::ServFail,
            ResponseStatus::Success => ResponseCode::NoError,
        }
    }
}

/// How a reply is signed.
enum Signing<'a> {
    Unsigned,
    /// Signed with the configured key, without a request MAC to chain from.
    Unchained,
    Chained(&'a AuthContext),
}

/// The first bytes of a message, read without decoding the rest of it.
#[derive(Debug, Clone, Copy)]
struct WireHeader {
    id: u16,
    is_response: bool,
    op_code: u8,
    recursion_desired: bool,
}

impl WireHeader {
    fn read(raw: &[u8]) -> Option<Self> {
        if raw.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            id: u16::from_be_bytes([raw[0], raw[1]]),
            is_response: raw[2] & 0x80 != 0,
            op_code: (raw[2] >> 3) & 0x0f,
            recursion_desired: raw[2] & 0x01 != 0,
        })
    }

    fn accepted(self) -> bool {
        matches!(self.op_code, OPCODE_QUERY | OPCODE_NOTIFY | OPCODE_UPDATE)
    }

    /// A bare reply carrying only a header, for messages that can't be decoded as a whole.
    fn reply(self, code: ResponseCode) -> Vec<u8> {
        let mut reply = vec![0; HEADER_LEN];
        reply[..2].copy_from_slice(&self.id.to_be_bytes());
        reply[2] = 0x80 | (self.op_code << 3) | u8::from(self.recursion_desired);
        reply[3] = code.low();
        reply
    }
}

/// Processes one inbound message at a time: acceptance, authentication, authorization,
/// parsing and reconciliation, then builds the reply.
#[derive(Clone)]
pub struct Handler {
    authenticator: Authenticator,
    allowed_zones: Vec<String>,
    reconciler: Reconciler,
}

impl Handler {
    pub fn new(
        authenticator: Authenticator,
        allowed_zones: Vec<String>,
        reconciler: Reconciler,
    ) -> Self {
        Handler {
            authenticator,
            allowed_zones,
            reconciler,
        }
    }

    /// Build a handler from a validated [`Config`], writing to `store`.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the secret, key name or custom labels are unusable.
    pub fn from_config(config: &Config, store: DynEndpointStore) -> Result<Self, Error> {
        let authenticator = Authenticator::new(
            &config.tsig_key,
            config.secret_bytes()?,
            config.tsig_algorithm,
            config.tsig_fudge,
        )?;
        let reconciler = Reconciler::new(
            store,
            config.namespace.clone(),
            config.labels()?,
            config.store_timeout,
        );
        Ok(Self::new(
            authenticator,
            config.zones().map(String::from).collect(),
            reconciler,
        ))
    }

    /// Handle the message `raw` received from `src`, returning the encoded reply if one should
    /// be sent.
    pub async fn handle(&self, protocol: Protocol, src: SocketAddr, raw: &[u8]) -> Option<Vec<u8>> {
        let Some(header) = WireHeader::read(raw) else {
            debug!("dropping {} byte {protocol} message from {src}", raw.len());
            return None;
        };
        let span = info_span!("message", %protocol, %src, id = header.id);
        self.dispatch(header, raw).instrument(span).await
    }

    async fn dispatch(&self, header: WireHeader, raw: &[u8]) -> Option<Vec<u8>> {
        // Never answer a reply.
        if header.is_response {
            debug!("ignoring response message");
            return None;
        }
        if !header.accepted() {
            debug!("opcode {} not implemented", header.op_code);
            return Some(header.reply(ResponseCode::NotImp));
        }

        let request = match Message::from_vec(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!("failed to decode message: {e}");
                return Some(header.reply(ResponseCode::FormErr));
            }
        };
        if request.op_code() != OpCode::Update {
            debug!("{:?} messages are not implemented", request.op_code());
            return self.respond(&request, ResponseStatus::NotImplemented, Signing::Unsigned);
        }

        let context = match self.authenticator.validate(raw, &request) {
            Ok(context) => context,
            Err(AuthError::Unsigned) => {
                warn!("rejecting unsigned update");
                return self.respond(&request, ResponseStatus::NotAuth, Signing::Unsigned);
            }
            Err(e) => {
                warn!("TSIG validation failed: {e}");
                return self.respond(&request, ResponseStatus::NotAuth, Signing::Unchained);
            }
        };

        let status = self.process(&request).await;
        self.respond(&request, status, Signing::Chained(&context))
    }

    async fn process(&self, request: &Message) -> ResponseStatus {
        let Some(zone) = request.queries().first().map(|q| q.name().to_string()) else {
            warn!("update has no zone section");
            return ResponseStatus::FormatError;
        };
        if !is_zone_allowed(&zone, &self.allowed_zones) {
            warn!("zone {zone} is not allowed");
            return ResponseStatus::Refused;
        }

        let intents = match update::parse(request) {
            Ok(intents) => intents,
            Err(e) => {
                warn!("failed to parse update for zone {zone}: {e}");
                return ResponseStatus::FormatError;
            }
        };

        let mut changed = 0;
        for intent in &intents {
            match self.reconciler.apply(intent).await {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => {
                    error!("failed to apply {intent}: {e}");
                    return ResponseStatus::ServerFailure;
                }
            }
        }
        info!(
            "applied {} update(s) for zone {zone}, {changed} changed",
            intents.len()
        );
        ResponseStatus::Success
    }

    fn respond(
        &self,
        request: &Message,
        status: ResponseStatus,
        signing: Signing<'_>,
    ) -> Option<Vec<u8>> {
        let mut response = Message::error_msg(request.id(), request.op_code(), status.into());
        response.set_recursion_desired(request.recursion_desired());
        response.add_queries(request.queries().iter().cloned());

        let encoded = match signing {
            Signing::Unsigned => response.to_vec(),
            Signing::Unchained => self.authenticator.sign(response, None),
            Signing::Chained(context) => self.authenticator.sign(response, Some(context)),
        };
        match encoded {
            Ok(encoded) => {
                debug!("responding {status:?}");
                Some(encoded)
            }
            Err(e) => {
                error!("failed to encode {status:?} response: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod handlers_tests;
