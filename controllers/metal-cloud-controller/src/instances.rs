//! Per-node query surface
//!
//! The host framework asks, for each workload node, whether its instance still exists,
//! whether it is shut down, and what metadata it should be initialized with. Every query
//! first resolves the node's server claim; metadata assembly also stamps the cluster
//! label onto the claim and converges its desired power with the node's power-off
//! annotation.

use crate::addresses::AddressResolver;
use crate::constants::{
    ANNOTATION_POWER_OFF, LABEL_KEY_CLUSTER_NAME, LABEL_KEY_INSTANCE_TYPE, LABEL_KEY_REGION,
    LABEL_KEY_ZONE,
};
use crate::error::ProviderError;
use crate::identity::{IdentityResolver, node_provider_id};
use crate::patch::label_patch;
use crate::provider_id;
use crds::{Power, Server, ServerClaim, ServerPowerState};
use k8s_openapi::api::core::v1::{Node, NodeAddress};
use kube::ResourceExt;
use metal_client::{MetalClientTrait, ObjectKey};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Metadata a node is initialized with
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceMetadata {
    pub provider_id: String,
    pub instance_type: String,
    pub zone: String,
    pub region: String,
    /// Every label of the backing server
    pub additional_labels: BTreeMap<String, String>,
    pub node_addresses: Vec<NodeAddress>,
}

/// Instance queries consumed by the host framework
///
/// [`ProviderError::InstanceNotFound`] tells the framework the node has no backing
/// instance any more.
#[async_trait::async_trait]
pub trait InstancesV2: Send + Sync {
    /// Whether a server claim backs `node`
    async fn instance_exists(&self, node: &Node) -> Result<bool, ProviderError>;
    /// Whether the server backing `node` reports itself powered off
    async fn instance_shutdown(&self, node: &Node) -> Result<bool, ProviderError>;
    /// Metadata for `node`, converging the claim's labels and power on the way
    async fn instance_metadata(&self, node: &Node) -> Result<InstanceMetadata, ProviderError>;
}

/// Instance queries answered from the metal cluster
#[derive(Clone)]
pub struct MetalInstances {
    metal: Arc<dyn MetalClientTrait>,
    identity: IdentityResolver,
    addresses: AddressResolver,
    cluster_name: String,
}

impl MetalInstances {
    pub fn new(
        metal: Arc<dyn MetalClientTrait>,
        addresses: AddressResolver,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self {
            identity: IdentityResolver::new(Arc::clone(&metal)),
            metal,
            addresses,
            cluster_name: cluster_name.into(),
        }
    }

    async fn server_for_claim(&self, claim: &ServerClaim) -> Result<Server, ProviderError> {
        let key = ObjectKey::from_resource(claim);
        let name = claim
            .server_name()
            .ok_or_else(|| ProviderError::ServerNotBound(key.to_string()))?;
        self.metal
            .get_server(name)
            .await
            .map_err(|e| ProviderError::remote(format!("failed to get server {} for claim {}", name, key), e))
    }

    async fn patch_claim(
        &self,
        key: &ObjectKey,
        patch: &serde_json::Value,
        node_name: &str,
    ) -> Result<ServerClaim, ProviderError> {
        self.metal.patch_server_claim(key, patch).await.map_err(|e| {
            ProviderError::remote(format!("failed to patch server claim {} for node {}", key, node_name), e)
        })
    }

    /// Stamp the cluster label, then converge desired power
    async fn converge_claim(&self, node: &Node, mut claim: ServerClaim) -> Result<ServerClaim, ProviderError> {
        let node_name = node.name_any();
        let key = ObjectKey::from_resource(&claim);

        if let Some(patch) = label_patch(
            claim.metadata.labels.as_ref(),
            LABEL_KEY_CLUSTER_NAME,
            Some(self.cluster_name.as_str()),
        ) {
            info!("Adding cluster name label to server claim {} for node {}", key, node_name);
            claim = self.patch_claim(&key, &patch, &node_name).await?;
        }

        let desired = if node.annotations().contains_key(ANNOTATION_POWER_OFF) {
            Power::Off
        } else {
            Power::On
        };
        if claim.spec.power != desired {
            info!(
                "Setting power of server claim {} to {} for node {}",
                key,
                desired.as_str(),
                node_name
            );
            let patch = json!({ "spec": { "power": desired.as_str() } });
            claim = self.patch_claim(&key, &patch, &node_name).await?;
        }
        Ok(claim)
    }
}

impl std::fmt::Debug for MetalInstances {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetalInstances")
            .field("identity", &self.identity)
            .field("addresses", &self.addresses)
            .field("cluster_name", &self.cluster_name)
            .finish_non_exhaustive()
    }
}

fn server_label(server: &Server, key: &str, what: &str, node_name: &str) -> String {
    match server.labels().get(key) {
        Some(value) => value.clone(),
        None => {
            warn!("No {} label found on server {} for node {}", what, server.name_any(), node_name);
            String::new()
        }
    }
}

#[async_trait::async_trait]
impl InstancesV2 for MetalInstances {
    async fn instance_exists(&self, node: &Node) -> Result<bool, ProviderError> {
        debug!("Checking if node {} exists", node.name_any());
        let claim = self.identity.resolve_claim_for_node(node).await?;
        debug!(
            "Instance for node {} exists: server claim {}",
            node.name_any(),
            ObjectKey::from_resource(&claim)
        );
        Ok(true)
    }

    async fn instance_shutdown(&self, node: &Node) -> Result<bool, ProviderError> {
        debug!("Checking if instance of node {} is shut down", node.name_any());
        let claim = self.identity.resolve_claim_for_node(node).await?;
        let server = match self.server_for_claim(&claim).await {
            Ok(server) => server,
            Err(e) if e.is_not_found() => return Err(ProviderError::InstanceNotFound),
            Err(e) => return Err(e),
        };
        let shutdown = server.power_state() == Some(ServerPowerState::Off);
        debug!("Instance of node {} shut down: {}", node.name_any(), shutdown);
        Ok(shutdown)
    }

    async fn instance_metadata(&self, node: &Node) -> Result<InstanceMetadata, ProviderError> {
        let node_name = node.name_any();
        let claim = self.identity.resolve_claim_for_node(node).await?;
        let claim = self.converge_claim(node, claim).await?;
        let server = self.server_for_claim(&claim).await?;

        let provider_id = match node_provider_id(node) {
            Some(id) => id.to_string(),
            None => provider_id::encode(
                claim.namespace().as_deref().unwrap_or(self.metal.namespace()),
                &claim.name_any(),
            ),
        };

        Ok(InstanceMetadata {
            provider_id,
            instance_type: server_label(&server, LABEL_KEY_INSTANCE_TYPE, "instance type", &node_name),
            zone: server_label(&server, LABEL_KEY_ZONE, "zone", &node_name),
            region: server_label(&server, LABEL_KEY_REGION, "region", &node_name),
            additional_labels: server.labels().clone(),
            node_addresses: self.addresses.node_addresses(&server, &claim).await?,
        })
    }
}
