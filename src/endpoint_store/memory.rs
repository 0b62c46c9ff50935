use crate::crd::DNSEndpoint;
use crate::endpoint_store::{EndpointStore, StoreError};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// An in-memory implementation of [`EndpointStore`] with API server style resource versions.
///
/// Every successful write bumps a store-wide version counter which is written to
/// `metadata.resourceVersion`. Nothing survives a restart.
#[derive(Default, Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct InMemoryEndpointStore {
    state: RwLock<State>,
}

#[derive(Default, Debug)]
struct State {
    endpoints: BTreeMap<String, DNSEndpoint>,
    version: u64,
    mutations: usize,
}

impl State {
    fn stamp(&mut self, endpoint: &DNSEndpoint) -> DNSEndpoint {
        self.version += 1;
        self.mutations += 1;
        let mut stored = endpoint.clone();
        stored.metadata.resource_version = Some(self.version.to_string());
        stored
    }
}

impl InMemoryEndpointStore {
    /// Number of successful create, replace and delete calls so far.
    pub async fn mutations(&self) -> usize {
        self.state.read().await.mutations
    }

    /// A copy of every stored resource, ordered by name.
    pub async fn snapshot(&self) -> Vec<DNSEndpoint> {
        let state = self.state.read().await;
        state.endpoints.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl EndpointStore for InMemoryEndpointStore {
    async fn get(&self, name: &str) -> Result<DNSEndpoint, StoreError> {
        self.state
            .read()
            .await
            .endpoints
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn create(&self, endpoint: &DNSEndpoint) -> Result<DNSEndpoint, StoreError> {
        let name = endpoint.name_any();
        let mut state = self.state.write().await;
        if state.endpoints.contains_key(&name) {
            return Err(StoreError::Conflict(name));
        }
        let stored = state.stamp(endpoint);
        state.endpoints.insert(name, stored.clone());
        Ok(stored)
    }

    async fn replace(&self, name: &str, endpoint: &DNSEndpoint) -> Result<DNSEndpoint, StoreError> {
        let mut state = self.state.write().await;
        let current = state
            .endpoints
            .get(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        if let Some(expected) = endpoint.resource_version() {
            if current.resource_version().as_deref() != Some(expected.as_str()) {
                return Err(StoreError::Conflict(name.to_string()));
            }
        }
        let stored = state.stamp(endpoint);
        state.endpoints.insert(name.to_string(), stored.clone());
        Ok(stored)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.endpoints.remove(name).is_none() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        state.mutations += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
