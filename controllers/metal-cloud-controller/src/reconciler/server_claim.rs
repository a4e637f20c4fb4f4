//! ServerClaim reconciler
//!
//! Mirrors the maintenance-needed label of a server claim onto the node that claim
//! backs, so operators working in the workload cluster see which nodes are waiting for
//! their approval.

use super::Reconcile;
use crate::constants::LABEL_KEY_MAINTENANCE_NEEDED;
use crate::error::ProviderError;
use crate::patch::label_patch;
use crate::provider_id;
use kube::ResourceExt;
use metal_client::{MetalClientTrait, ObjectKey, WorkloadClientTrait};
use std::sync::Arc;
use tracing::{debug, info};

/// Reconciles metal cluster ServerClaims
pub struct ServerClaimReconciler {
    metal: Arc<dyn MetalClientTrait>,
    workload: Arc<dyn WorkloadClientTrait>,
}

impl ServerClaimReconciler {
    pub fn new(metal: Arc<dyn MetalClientTrait>, workload: Arc<dyn WorkloadClientTrait>) -> Self {
        Self { metal, workload }
    }
}

#[async_trait::async_trait]
impl Reconcile for ServerClaimReconciler {
    fn kind(&self) -> &'static str {
        "ServerClaim"
    }

    async fn reconcile(&self, key: &ObjectKey) -> Result<(), ProviderError> {
        debug!("Reconciling ServerClaim {}", key);
        let claim = match self.metal.get_server_claim(key).await {
            Ok(claim) => claim,
            Err(e) if e.is_not_found() => {
                debug!("ServerClaim {} not found, skipping reconciliation", key);
                return Ok(());
            }
            Err(e) => return Err(ProviderError::remote(format!("failed to get server claim {}", key), e)),
        };

        let namespace = claim.namespace().unwrap_or_else(|| self.metal.namespace().to_string());
        let provider_id = provider_id::encode(&namespace, &claim.name_any());
        let mut nodes = self
            .workload
            .list_nodes_by_provider_id(&provider_id)
            .await
            .map_err(|e| ProviderError::remote(format!("failed to list nodes with provider ID {}", provider_id), e))?;

        let node = match nodes.len() {
            0 => {
                debug!("No nodes found with provider ID {}", provider_id);
                return Ok(());
            }
            1 => nodes.remove(0),
            count => return Err(ProviderError::DuplicateNodes { provider_id, count }),
        };

        let node_name = node.name_any();
        let Some(patch) = label_patch(
            node.metadata.labels.as_ref(),
            LABEL_KEY_MAINTENANCE_NEEDED,
            claim.label(LABEL_KEY_MAINTENANCE_NEEDED),
        ) else {
            return Ok(());
        };
        info!("Mirroring maintenance-needed of server claim {} onto node {}", key, node_name);
        self.workload
            .patch_node(&node_name, &patch)
            .await
            .map_err(|e| ProviderError::remote(format!("failed to patch node {}", node_name), e))?;
        Ok(())
    }
}
