//! Storage of [`DNSEndpoint`] resources.
//!
//! The bridge never keeps records itself: every change is written to a declarative store
//! that ExternalDNS watches. The store is reached through the narrow [`EndpointStore`] trait so
//! that the reconciler doesn't depend on a particular client.
//!
//! Two implementations are provided, [`kubernetes::KubeEndpointStore`] and
//! [`memory::InMemoryEndpointStore`]. The former talks to the Kubernetes API server. The latter
//! keeps resources in process memory with the same optimistic concurrency rules, and is what
//! the tests run against.

use crate::crd::DNSEndpoint;
use std::sync::Arc;
use std::time::Duration;

pub mod kubernetes;
pub mod memory;

pub use kubernetes::KubeEndpointStore;
pub use memory::InMemoryEndpointStore;

/// `DynEndpointStore` is a type alias for an [`EndpointStore`] shared by every in-flight
/// request. Implementations synchronize internally; callers never hold a lock across calls.
#[allow(clippy::module_name_repetitions)]
pub type DynEndpointStore = Arc<dyn EndpointStore + Send + Sync>;

/// Failures of a store call. Not-found and conflict are distinguished so callers can treat a
/// missing resource as a normal outcome and surface lost races.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("DNSEndpoint \"{0}\" not found")]
    NotFound(String),

    /// The resource already exists, or changed since the version the write was based on.
    #[error("DNSEndpoint \"{0}\" was modified concurrently")]
    Conflict(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

/// An async trait describing get/create/replace/delete by name of [`DNSEndpoint`] resources in
/// a single namespace.
#[async_trait::async_trait]
#[allow(clippy::module_name_repetitions)]
pub trait EndpointStore {
    /// Fetch the resource called `name`, or [`StoreError::NotFound`].
    async fn get(&self, name: &str) -> Result<DNSEndpoint, StoreError>;

    /// Create `endpoint`, or fail with [`StoreError::Conflict`] if the name is taken.
    async fn create(&self, endpoint: &DNSEndpoint) -> Result<DNSEndpoint, StoreError>;

    /// Replace the resource called `name`. When `endpoint` carries a resource version the write
    /// only succeeds if it still matches the stored one.
    async fn replace(&self, name: &str, endpoint: &DNSEndpoint) -> Result<DNSEndpoint, StoreError>;

    /// Delete the resource called `name`, or [`StoreError::NotFound`].
    async fn delete(&self, name: &str) -> Result<(), StoreError>;
}
