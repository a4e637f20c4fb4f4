//! Store traits for mocking
//!
//! The concrete kube-backed clients implement these traits, and tests can use the
//! in-memory implementations from the `test-util` feature.

use crate::error::ClientError;
use crate::key::ObjectKey;
use crds::{IP, IPAddress, IPAddressClaim, Server, ServerClaim};
use k8s_openapi::api::core::v1::Node;
use std::collections::BTreeMap;

/// Metal management cluster operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait MetalClientTrait: Send + Sync {
    /// Namespace the controller's server claims live in
    fn namespace(&self) -> &str;

    async fn get_server_claim(&self, key: &ObjectKey) -> Result<ServerClaim, ClientError>;
    /// Server claims in the controller's namespace, in API listing order
    async fn list_server_claims(&self) -> Result<Vec<ServerClaim>, ClientError>;
    /// Apply a JSON merge patch to a server claim
    async fn patch_server_claim(&self, key: &ObjectKey, patch: &serde_json::Value) -> Result<ServerClaim, ClientError>;
    async fn get_server(&self, name: &str) -> Result<Server, ClientError>;

    // IPAM
    async fn get_ip(&self, key: &ObjectKey) -> Result<IP, ClientError>;
    async fn list_ip_address_claims(&self, namespace: &str, labels: &BTreeMap<String, String>) -> Result<Vec<IPAddressClaim>, ClientError>;
    async fn get_ip_address(&self, key: &ObjectKey) -> Result<IPAddress, ClientError>;
}

/// Workload cluster operations
#[async_trait::async_trait]
pub trait WorkloadClientTrait: Send + Sync {
    async fn get_node(&self, name: &str) -> Result<Node, ClientError>;
    /// Nodes whose `spec.providerID` equals `provider_id`
    async fn list_nodes_by_provider_id(&self, provider_id: &str) -> Result<Vec<Node>, ClientError>;
    /// Apply a JSON merge patch to a node
    async fn patch_node(&self, name: &str, patch: &serde_json::Value) -> Result<Node, ClientError>;
}
