//! TSIG ([RFC 8945]) verification of inbound updates and signing of replies.
//!
//! The MAC covers the message exactly as it arrived on the wire, so verification works on the
//! raw bytes rather than on a re-encoded [`Message`]. Replies to signed requests chain from
//! the request MAC.
//!
//! [RFC 8945]: https://www.rfc-editor.org/rfc/rfc8945

use clap::ValueEnum;
use hickory_proto::error::ProtoError;
use hickory_proto::op::Message;
use hickory_proto::rr::dnssec::rdata::tsig::{
    make_tsig_record, message_tbs, signed_bitmessage_to_buf, TsigAlgorithm, TSIG,
};
use hickory_proto::rr::dnssec::rdata::DNSSECRData;
use hickory_proto::rr::{Name, RData, RecordType};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use std::str::FromStr;
use time::OffsetDateTime;

/// HMAC algorithms accepted for the shared key.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    #[value(name = "hmac-md5")]
    HmacMd5,
    #[value(name = "hmac-sha1")]
    HmacSha1,
    #[value(name = "hmac-sha256")]
    HmacSha256,
    #[value(name = "hmac-sha512")]
    HmacSha512,
}

impl KeyAlgorithm {
    /// The algorithm as it appears in a TSIG record.
    pub fn to_tsig(self) -> TsigAlgorithm {
        match self {
            KeyAlgorithm::HmacMd5 => TsigAlgorithm::HmacMd5,
            KeyAlgorithm::HmacSha1 => TsigAlgorithm::HmacSha1,
            KeyAlgorithm::HmacSha256 => TsigAlgorithm::HmacSha256,
            KeyAlgorithm::HmacSha512 => TsigAlgorithm::HmacSha512,
        }
    }

    /// Compute the MAC of `data` under `key`.
    pub fn mac(self, key: &[u8], data: &[u8]) -> Vec<u8> {
        match self {
            KeyAlgorithm::HmacMd5 => compute::<Hmac<Md5>>(key, data),
            KeyAlgorithm::HmacSha1 => compute::<Hmac<Sha1>>(key, data),
            KeyAlgorithm::HmacSha256 => compute::<Hmac<Sha256>>(key, data),
            KeyAlgorithm::HmacSha512 => compute::<Hmac<Sha512>>(key, data),
        }
    }

    /// Constant time check of `mac` against the MAC of `data` under `key`.
    pub fn verify(self, key: &[u8], data: &[u8], mac: &[u8]) -> bool {
        match self {
            KeyAlgorithm::HmacMd5 => check::<Hmac<Md5>>(key, data, mac),
            KeyAlgorithm::HmacSha1 => check::<Hmac<Sha1>>(key, data, mac),
            KeyAlgorithm::HmacSha256 => check::<Hmac<Sha256>>(key, data, mac),
            KeyAlgorithm::HmacSha512 => check::<Hmac<Sha512>>(key, data, mac),
        }
    }
}

fn keyed<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Option<M> {
    let mut mac = <M as KeyInit>::new_from_slice(key).ok()?;
    mac.update(data);
    Some(mac)
}

fn compute<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Vec<u8> {
    keyed::<M>(key, data)
        .map_or_else(Vec::new, |mac| mac.finalize().into_bytes().to_vec())
}

fn check<M: Mac + KeyInit>(key: &[u8], data: &[u8], mac: &[u8]) -> bool {
    keyed::<M>(key, data)
        .is_some_and(|m| m.verify_slice(mac).is_ok())
}

/// Reasons a message fails authentication. None of them carry secret or MAC material.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("message is not signed")]
    Unsigned,

    #[error("signature record is malformed")]
    Malformed,

    #[error("TSIG key name mismatch: expected {expected}, got {received}")]
    KeyName { expected: String, received: String },

    #[error("TSIG algorithm mismatch: expected {expected}, got {received}")]
    Algorithm { expected: String, received: String },

    #[error("TSIG signature mismatch")]
    Signature,

    #[error("TSIG time {signed} is outside the {fudge}s window around {now}")]
    TimeSkew { signed: u64, now: u64, fudge: u16 },
}

/// State carried from a verified request to its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Key name exactly as the client sent it.
    pub key_name: Name,
    pub algorithm: KeyAlgorithm,
    /// The request MAC, chained into the reply signature.
    pub request_mac: Vec<u8>,
}

/// Verifies and produces TSIG signatures for the single configured key.
#[derive(Clone)]
pub struct Authenticator {
    key_name: String,
    signer_name: Name,
    secret: Vec<u8>,
    algorithm: KeyAlgorithm,
    fudge: u16,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("key_name", &self.key_name)
            .field("algorithm", &self.algorithm)
            .field("fudge", &self.fudge)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Build an authenticator for `key_name`. The name is always signed as a fully qualified
    /// name, whether or not it was configured with a trailing dot.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtoError`] if `key_name` isn't a valid DNS name.
    pub fn new(
        key_name: &str,
        secret: Vec<u8>,
        algorithm: KeyAlgorithm,
        fudge: u16,
    ) -> Result<Self, ProtoError> {
        let key_name = key_name.trim().trim_end_matches('.').to_string();
        let signer_name = Name::from_str(&format!("{key_name}."))?;
        Ok(Self {
            key_name,
            signer_name,
            secret,
            algorithm,
            fudge,
        })
    }

    /// Verify the TSIG record of an inbound request against the current time.
    ///
    /// `raw` must be the exact bytes `message` was decoded from.
    ///
    /// # Errors
    ///
    /// Returns the first [`AuthError`] found, checking in order: presence of the signature,
    /// key name, algorithm, MAC and finally the signing time.
    pub fn validate(&self, raw: &[u8], message: &Message) -> Result<AuthContext, AuthError> {
        self.validate_at(raw, message, None, unix_now())
    }

    /// Like [`Authenticator::validate`] with an explicit clock and an optional previous MAC,
    /// which is how a client checks a reply that chains from its request.
    ///
    /// # Errors
    ///
    /// See [`Authenticator::validate`].
    pub fn validate_at(
        &self,
        raw: &[u8],
        message: &Message,
        previous_mac: Option<&[u8]>,
        now: u64,
    ) -> Result<AuthContext, AuthError> {
        let record = message
            .signature()
            .iter()
            .find(|r| r.record_type() == RecordType::TSIG)
            .ok_or(AuthError::Unsigned)?;
        let Some(RData::DNSSEC(DNSSECRData::TSIG(tsig))) = record.data() else {
            return Err(AuthError::Malformed);
        };

        let received = record.name().to_string();
        if !self.key_name_matches(&received) {
            return Err(AuthError::KeyName {
                expected: self.key_name.clone(),
                received,
            });
        }

        let expected_algorithm = self.algorithm.to_tsig();
        if *tsig.algorithm() != expected_algorithm {
            return Err(AuthError::Algorithm {
                expected: expected_algorithm.to_name().to_string(),
                received: tsig.algorithm().to_name().to_string(),
            });
        }

        let (tbv, _) =
            signed_bitmessage_to_buf(previous_mac, raw, true).map_err(|_| AuthError::Malformed)?;
        if !self.algorithm.verify(&self.secret, &tbv, tsig.mac()) {
            return Err(AuthError::Signature);
        }

        if tsig.time().abs_diff(now) > u64::from(self.fudge) {
            return Err(AuthError::TimeSkew {
                signed: tsig.time(),
                now,
                fudge: self.fudge,
            });
        }

        Ok(AuthContext {
            key_name: record.name().clone(),
            algorithm: self.algorithm,
            request_mac: tsig.mac().to_vec(),
        })
    }

    /// Sign `message` with the configured key and the current time, chaining from the request
    /// MAC in `context` when there is one.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtoError`] if the message can't be encoded.
    pub fn sign(
        &self,
        message: Message,
        context: Option<&AuthContext>,
    ) -> Result<Vec<u8>, ProtoError> {
        self.sign_at(
            message,
            context.map(|c| c.request_mac.as_slice()),
            unix_now(),
        )
    }

    /// Sign `message` at time `now`. Without `previous_mac` this produces a request signature.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtoError`] if the message can't be encoded.
    pub fn sign_at(
        &self,
        mut message: Message,
        previous_mac: Option<&[u8]>,
        now: u64,
    ) -> Result<Vec<u8>, ProtoError> {
        let pre_tsig = TSIG::new(
            self.algorithm.to_tsig(),
            now,
            self.fudge,
            Vec::new(),
            message.id(),
            0,
            Vec::new(),
        );
        let tbs = message_tbs(previous_mac, &message, &pre_tsig, &self.signer_name)?;
        let mac = self.algorithm.mac(&self.secret, &tbs);
        message.add_tsig(make_tsig_record(
            self.signer_name.clone(),
            pre_tsig.set_mac(mac),
        ));
        message.to_vec()
    }

    fn key_name_matches(&self, received: &str) -> bool {
        received.eq_ignore_ascii_case(&self.key_name)
            || received.eq_ignore_ascii_case(&format!("{}.", self.key_name))
    }
}

fn unix_now() -> u64 {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    u64::try_from(now).unwrap_or_default()
}

#[cfg(test)]
#[path = "tsig_tests.rs"]
mod tsig_tests;
