//! Applies [`RecordChangeIntent`]s to the [`EndpointStore`][crate::endpoint_store::EndpointStore].
//!
//! Each hostname is managed through exactly one `DNSEndpoint`, named after the sanitized record
//! name. Upserts are idempotent: when the stored labels and spec already match the desired state
//! nothing is written. Deletes remove the whole resource whatever the record type, and deleting
//! an absent resource succeeds.

use crate::crd::{DNSEndpoint, DNSEndpointSpec, Endpoint};
use crate::dns::update::{ChangeKind, RecordChangeIntent};
use crate::endpoint_store::{DynEndpointStore, StoreError};
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info};

/// Label marking resources written by the bridge.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "ddnsbridge";

/// Label holding the sanitized zone the record was updated through.
pub const ZONE_LABEL: &str = "ddnsbridge/zone";

/// Prepended when a sanitized name wouldn't start with a letter or digit.
const NAME_PREFIX: &str = "dns-";

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Convert a DNS name into a valid resource name (at most 253 characters).
///
/// The trailing dot is dropped, letters are lower-cased, `.`, `_` and `:` become `-` and
/// anything else that isn't a lower-case letter, digit or `-` is removed. Trailing `-` are
/// trimmed since the API server rejects names that don't end in a letter or digit, so
/// `x-.example.com.` and `x.example.com.` differ but `x-` and `x` share a resource.
pub fn sanitize_name(name: &str) -> String {
    sanitize(name, MAX_NAME_LEN)
}

/// Like [`sanitize_name`] but bounded to the 63 characters allowed in a label value.
pub fn sanitize_label(name: &str) -> String {
    sanitize(name, MAX_LABEL_LEN)
}

fn sanitize(name: &str, max_len: usize) -> String {
    let mut sanitized: String = name
        .strip_suffix('.')
        .unwrap_or(name)
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => Some(c),
            '.' | '_' | ':' => Some('-'),
            _ => None,
        })
        .collect();

    if !sanitized.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        sanitized.insert_str(0, NAME_PREFIX);
    }
    // Only ASCII is left, so any byte offset is a char boundary.
    sanitized.truncate(max_len);
    sanitized.truncate(sanitized.trim_end_matches('-').len());
    sanitized
}

/// Writes intents to the store as `DNSEndpoint` resources in one namespace.
#[derive(Clone)]
pub struct Reconciler {
    store: DynEndpointStore,
    namespace: String,
    custom_labels: BTreeMap<String, String>,
    timeout: Duration,
}

impl Reconciler {
    /// Create a reconciler. `custom_labels` are added to every resource and override the
    /// built-in labels on a key collision. Every store call is bounded by `timeout`.
    pub fn new(
        store: DynEndpointStore,
        namespace: impl Into<String>,
        custom_labels: BTreeMap<String, String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            custom_labels,
            timeout,
        }
    }

    /// The labels every resource for `zone` carries.
    pub fn labels(&self, zone: &str) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::from([
            (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
            (ZONE_LABEL.to_string(), sanitize_label(zone)),
        ]);
        labels.extend(self.custom_labels.clone());
        labels
    }

    /// The resource an upsert of `address` with `ttl` for `intent` should leave in the store.
    pub fn desired_state(
        &self,
        intent: &RecordChangeIntent,
        address: IpAddr,
        ttl: u32,
    ) -> DNSEndpoint {
        DNSEndpoint {
            metadata: ObjectMeta {
                name: Some(sanitize_name(&intent.name)),
                namespace: Some(self.namespace.clone()),
                labels: Some(self.labels(&intent.zone)),
                ..ObjectMeta::default()
            },
            spec: DNSEndpointSpec {
                endpoints: vec![Endpoint {
                    dns_name: intent.name.clone(),
                    record_type: intent.record_type.to_string(),
                    record_ttl: Some(i64::from(ttl)),
                    targets: vec![address.to_string()],
                    ..Endpoint::default()
                }],
            },
            status: None,
        }
    }

    /// Apply `intent`, returning whether the store was modified.
    ///
    /// # Errors
    ///
    /// Returns the [`StoreError`] of the first failing store call. A write based on a resource
    /// that changed after it was read fails with [`StoreError::Conflict`] and isn't retried.
    pub async fn apply(&self, intent: &RecordChangeIntent) -> Result<bool, StoreError> {
        match intent.kind {
            ChangeKind::Upsert { address, ttl } => self.upsert(intent, address, ttl).await,
            ChangeKind::DeleteRecord | ChangeKind::DeleteAllOfType => self.delete(intent).await,
        }
    }

    async fn upsert(
        &self,
        intent: &RecordChangeIntent,
        address: IpAddr,
        ttl: u32,
    ) -> Result<bool, StoreError> {
        let mut desired = self.desired_state(intent, address, ttl);
        let name = sanitize_name(&intent.name);

        let existing = match self.bounded(self.store.get(&name)).await {
            Ok(existing) => existing,
            Err(StoreError::NotFound(_)) => {
                self.bounded(self.store.create(&desired)).await?;
                info!("created DNSEndpoint {}/{name}: {intent}", self.namespace);
                return Ok(true);
            }
            Err(e) => return Err(e),
        };

        if existing.metadata.labels == desired.metadata.labels && existing.spec == desired.spec {
            debug!(
                "DNSEndpoint {}/{name} already up to date, skipping",
                self.namespace
            );
            return Ok(false);
        }

        debug!(
            "DNSEndpoint {}/{name} differs, updating from {:?} to {:?}",
            self.namespace, existing.spec.endpoints, desired.spec.endpoints
        );
        desired.metadata.resource_version = existing.metadata.resource_version;
        self.bounded(self.store.replace(&name, &desired)).await?;
        info!("updated DNSEndpoint {}/{name}: {intent}", self.namespace);
        Ok(true)
    }

    async fn delete(&self, intent: &RecordChangeIntent) -> Result<bool, StoreError> {
        let name = sanitize_name(&intent.name);
        match self.bounded(self.store.delete(&name)).await {
            Ok(()) => {
                info!("deleted DNSEndpoint {}/{name}: {intent}", self.namespace);
                Ok(true)
            }
            Err(StoreError::NotFound(_)) => {
                debug!(
                    "DNSEndpoint {}/{name} already absent: {intent}",
                    self.namespace
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
