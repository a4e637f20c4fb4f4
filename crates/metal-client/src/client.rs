//! Kube-backed store clients
//!
//! `MetalClient` reads and patches objects in the metal management cluster directly
//! against its API server. `WorkloadClient` does the same for Nodes, but answers
//! provider-ID lookups from the reflector cache the node informer maintains, since the
//! API server cannot select Nodes by `spec.providerID`.

use crate::client_trait::{MetalClientTrait, WorkloadClientTrait};
use crate::error::ClientError;
use crate::key::ObjectKey;
use crds::{IP, IPAddress, IPAddressClaim, Server, ServerClaim};
use k8s_openapi::api::core::v1::Node;
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client};
use kube_runtime::reflector::Store;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Client for the metal management cluster
#[derive(Clone)]
pub struct MetalClient {
    client: Client,
    namespace: String,
}

impl std::fmt::Debug for MetalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetalClient")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl MetalClient {
    /// Create a client scoped to the namespace holding the controller's server claims
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// The underlying kube client
    pub fn kube_client(&self) -> &Client {
        &self.client
    }

    fn namespaced<K>(&self, key: &ObjectKey) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        let namespace = key.namespace.as_deref().unwrap_or(&self.namespace);
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait::async_trait]
impl MetalClientTrait for MetalClient {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get_server_claim(&self, key: &ObjectKey) -> Result<ServerClaim, ClientError> {
        self.namespaced::<ServerClaim>(key)
            .get_opt(&key.name)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("ServerClaim {}", key)))
    }

    async fn list_server_claims(&self) -> Result<Vec<ServerClaim>, ClientError> {
        let api: Api<ServerClaim> = Api::namespaced(self.client.clone(), &self.namespace);
        let list = api.list(&ListParams::default()).await?;
        debug!("Listed {} server claims in {}", list.items.len(), self.namespace);
        Ok(list.items)
    }

    async fn patch_server_claim(&self, key: &ObjectKey, patch: &serde_json::Value) -> Result<ServerClaim, ClientError> {
        debug!("Patching ServerClaim {}: {}", key, patch);
        let patched = self
            .namespaced::<ServerClaim>(key)
            .patch(&key.name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(patched)
    }

    async fn get_server(&self, name: &str) -> Result<Server, ClientError> {
        let api: Api<Server> = Api::all(self.client.clone());
        api.get_opt(name)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("Server {}", name)))
    }

    async fn get_ip(&self, key: &ObjectKey) -> Result<IP, ClientError> {
        self.namespaced::<IP>(key)
            .get_opt(&key.name)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("IP {}", key)))
    }

    async fn list_ip_address_claims(&self, namespace: &str, labels: &BTreeMap<String, String>) -> Result<Vec<IPAddressClaim>, ClientError> {
        let api: Api<IPAddressClaim> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&label_selector(labels));
        Ok(api.list(&params).await?.items)
    }

    async fn get_ip_address(&self, key: &ObjectKey) -> Result<IPAddress, ClientError> {
        self.namespaced::<IPAddress>(key)
            .get_opt(&key.name)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("IPAddress {}", key)))
    }
}

/// Client for the workload cluster
#[derive(Clone)]
pub struct WorkloadClient {
    nodes: Api<Node>,
    cache: Store<Node>,
}

impl std::fmt::Debug for WorkloadClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkloadClient").finish_non_exhaustive()
    }
}

impl WorkloadClient {
    /// Create a client reading provider-ID lookups from the node informer's cache
    pub fn new(client: Client, cache: Store<Node>) -> Self {
        Self {
            nodes: Api::all(client),
            cache,
        }
    }
}

#[async_trait::async_trait]
impl WorkloadClientTrait for WorkloadClient {
    async fn get_node(&self, name: &str) -> Result<Node, ClientError> {
        self.nodes
            .get_opt(name)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("Node {}", name)))
    }

    async fn list_nodes_by_provider_id(&self, provider_id: &str) -> Result<Vec<Node>, ClientError> {
        Ok(self
            .cache
            .state()
            .into_iter()
            .filter(|node| {
                node.spec.as_ref().and_then(|s| s.provider_id.as_deref()) == Some(provider_id)
            })
            .map(Arc::unwrap_or_clone)
            .collect())
    }

    async fn patch_node(&self, name: &str, patch: &serde_json::Value) -> Result<Node, ClientError> {
        debug!("Patching Node {}: {}", name, patch);
        Ok(self
            .nodes
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?)
    }
}
