//! A Kubernetes API backed implementation of the [`EndpointStore`][super::EndpointStore] trait.

use crate::crd::DNSEndpoint;
use crate::endpoint_store::{EndpointStore, StoreError};
use crate::error::Error;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

/// Reads and writes [`DNSEndpoint`] resources in one namespace through the API server.
///
/// Writes go through `replace` with the resource version read earlier, so the API server
/// rejects an update based on a stale read with `409 Conflict`.
#[derive(Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct KubeEndpointStore {
    api: Api<DNSEndpoint>,
}

impl KubeEndpointStore {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }

    /// Build a store from ambient credentials: the in-cluster service account when running in
    /// a pod, otherwise the local kubeconfig (`KUBECONFIG` or `~/.kube/config`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Kube`] when no usable credentials are found.
    pub async fn try_default(namespace: &str) -> Result<Self, Error> {
        let client = Client::try_default().await?;
        debug!("kubernetes client initialized for namespace {namespace}");
        Ok(Self::new(client, namespace))
    }
}

fn store_error(name: &str, err: kube::Error) -> StoreError {
    match &err {
        kube::Error::Api(status) if status.code == 404 => StoreError::NotFound(name.to_string()),
        kube::Error::Api(status) if status.code == 409 => StoreError::Conflict(name.to_string()),
        _ => StoreError::Kube(err),
    }
}

#[async_trait::async_trait]
impl EndpointStore for KubeEndpointStore {
    async fn get(&self, name: &str) -> Result<DNSEndpoint, StoreError> {
        self.api.get(name).await.map_err(|e| store_error(name, e))
    }

    async fn create(&self, endpoint: &DNSEndpoint) -> Result<DNSEndpoint, StoreError> {
        let name = endpoint.metadata.name.clone().unwrap_or_default();
        self.api
            .create(&PostParams::default(), endpoint)
            .await
            .map_err(|e| store_error(&name, e))
    }

    async fn replace(&self, name: &str, endpoint: &DNSEndpoint) -> Result<DNSEndpoint, StoreError> {
        self.api
            .replace(name, &PostParams::default(), endpoint)
            .await
            .map_err(|e| store_error(name, e))
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.api
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| store_error(name, e))
    }
}

#[cfg(test)]
#[path = "kubernetes_tests.rs"]
mod kubernetes_tests;
