//! Node reconciler
//!
//! Runs two independent passes per node:
//! - copies an operator's maintenance approval from the node onto its server claim, but
//!   only while the claim asks for maintenance
//! - assigns the node a pod address block derived from its first internal address

use super::Reconcile;
use crate::cidr;
use crate::constants::{LABEL_KEY_MAINTENANCE_APPROVAL, LABEL_KEY_MAINTENANCE_NEEDED, NODE_INTERNAL_IP, TRUE_STR};
use crate::error::ProviderError;
use crate::identity::{IdentityResolver, node_provider_id};
use crate::patch::label_patch;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use metal_client::{MetalClientTrait, ObjectKey, WorkloadClientTrait};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Reconciles workload cluster Nodes
pub struct NodeReconciler {
    workload: Arc<dyn WorkloadClientTrait>,
    metal: Arc<dyn MetalClientTrait>,
    identity: IdentityResolver,
    pod_prefix: Option<u8>,
}

impl NodeReconciler {
    /// `pod_prefix` of `None` disables pod address block assignment
    pub fn new(
        workload: Arc<dyn WorkloadClientTrait>,
        metal: Arc<dyn MetalClientTrait>,
        pod_prefix: Option<u8>,
    ) -> Self {
        Self {
            identity: IdentityResolver::new(Arc::clone(&metal)),
            workload,
            metal,
            pod_prefix,
        }
    }

    /// Mirror the maintenance approval onto the node's server claim
    ///
    /// The claim carries the approval label iff it needs maintenance and the node is
    /// labelled as approved.
    async fn sync_maintenance_approval(&self, node: &Node) -> Result<(), ProviderError> {
        let node_name = node.name_any();
        let Some(id) = node_provider_id(node) else {
            debug!("Node {} has no provider ID yet, skipping maintenance approval", node_name);
            return Ok(());
        };
        let claim = match self.identity.claim_for_provider_id(id).await {
            Ok(claim) => claim,
            Err(ProviderError::InstanceNotFound) => {
                debug!("No server claim for node {}, skipping maintenance approval", node_name);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let needed = claim.label(LABEL_KEY_MAINTENANCE_NEEDED) == Some(TRUE_STR);
        let approved = node.labels().get(LABEL_KEY_MAINTENANCE_APPROVAL).map(String::as_str) == Some(TRUE_STR);
        let desired = (needed && approved).then_some(TRUE_STR);

        let Some(patch) = label_patch(claim.metadata.labels.as_ref(), LABEL_KEY_MAINTENANCE_APPROVAL, desired) else {
            return Ok(());
        };
        let key = ObjectKey::from_resource(&claim);
        info!(
            "{} maintenance approval on server claim {} from node {}",
            if desired.is_some() { "Setting" } else { "Removing" },
            key,
            node_name
        );
        self.metal
            .patch_server_claim(&key, &patch)
            .await
            .map_err(|e| ProviderError::remote(format!("failed to patch server claim {}", key), e))?;
        Ok(())
    }

    /// Assign a pod address block once, from the node's first internal address
    async fn assign_pod_cidr(&self, node: &Node) -> Result<(), ProviderError> {
        let Some(prefix) = self.pod_prefix else {
            return Ok(());
        };
        let node_name = node.name_any();
        let spec = node.spec.as_ref();
        let has_cidr = spec.and_then(|s| s.pod_cidr.as_deref()).is_some_and(|c| !c.is_empty())
            || spec.and_then(|s| s.pod_cidrs.as_ref()).is_some_and(|c| !c.is_empty());
        if has_cidr {
            return Ok(());
        }

        let internal = node
            .status
            .as_ref()
            .and_then(|s| s.addresses.as_ref())
            .and_then(|addresses| addresses.iter().find(|a| a.type_ == NODE_INTERNAL_IP));
        let Some(internal) = internal else {
            debug!("Node {} has no internal address yet, leaving pod CIDR unset", node_name);
            return Ok(());
        };

        let pod_cidr = cidr::pod_cidr(&internal.address, prefix)?;
        info!("Assigning pod CIDR {} to node {}", pod_cidr, node_name);
        let patch = json!({
            "spec": {
                "podCIDR": pod_cidr,
                "podCIDRs": [pod_cidr],
            }
        });
        self.workload
            .patch_node(&node_name, &patch)
            .await
            .map_err(|e| ProviderError::remote(format!("failed to patch node {}", node_name), e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Reconcile for NodeReconciler {
    fn kind(&self) -> &'static str {
        "Node"
    }

    async fn reconcile(&self, key: &ObjectKey) -> Result<(), ProviderError> {
        debug!("Reconciling Node {}", key);
        let node = match self.workload.get_node(&key.name).await {
            Ok(node) => node,
            Err(e) if e.is_not_found() => {
                debug!("Node {} not found, skipping reconciliation", key);
                return Ok(());
            }
            Err(e) => return Err(ProviderError::remote(format!("failed to get node {}", key), e)),
        };

        self.sync_maintenance_approval(&node).await?;
        self.assign_pod_cidr(&node).await
    }
}
