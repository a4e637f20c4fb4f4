//! Node to server claim resolution
//!
//! A node that already carries a provider ID names its claim directly. A node without
//! one (first contact, before the host framework has written the provider ID back) is
//! matched by the hardware UUID the kubelet reports against the servers bound to the
//! claims in the metal namespace.

use crate::error::ProviderError;
use crate::provider_id;
use crds::ServerClaim;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use metal_client::{MetalClientTrait, ObjectKey};
use std::sync::Arc;
use tracing::{debug, warn};

/// Provider ID stored on a node, if any
pub fn node_provider_id(node: &Node) -> Option<&str> {
    node.spec
        .as_ref()
        .and_then(|spec| spec.provider_id.as_deref())
        .filter(|id| !id.is_empty())
}

/// Hardware UUID reported by the node's kubelet, if any
pub fn node_system_uuid(node: &Node) -> Option<&str> {
    node.status
        .as_ref()
        .and_then(|status| status.node_info.as_ref())
        .map(|info| info.system_uuid.as_str())
        .filter(|uuid| !uuid.is_empty())
}

/// Resolves workload nodes to metal server claims
#[derive(Clone)]
pub struct IdentityResolver {
    metal: Arc<dyn MetalClientTrait>,
}

impl IdentityResolver {
    pub fn new(metal: Arc<dyn MetalClientTrait>) -> Self {
        Self { metal }
    }

    /// Server claim backing `node`
    ///
    /// Returns [`ProviderError::InstanceNotFound`] when no claim backs the node.
    pub async fn resolve_claim_for_node(&self, node: &Node) -> Result<ServerClaim, ProviderError> {
        match node_provider_id(node) {
            Some(id) => self.claim_for_provider_id(id).await,
            None => self.claim_for_system_uuid(node).await,
        }
    }

    /// Server claim named by a provider ID, without any discovery fallback
    pub async fn claim_for_provider_id(&self, id: &str) -> Result<ServerClaim, ProviderError> {
        let key = provider_id::parse(id)?;
        match self.metal.get_server_claim(&key).await {
            Ok(claim) => Ok(claim),
            Err(e) if e.is_not_found() => {
                debug!("No server claim {} for provider ID {}", key, id);
                Err(ProviderError::InstanceNotFound)
            }
            Err(e) => Err(ProviderError::remote(
                format!("failed to get server claim for provider ID {}", id),
                e,
            )),
        }
    }

    async fn claim_for_system_uuid(&self, node: &Node) -> Result<ServerClaim, ProviderError> {
        let node_name = node.name_any();
        let Some(system_uuid) = node_system_uuid(node) else {
            debug!("Node {} has neither a provider ID nor a system UUID", node_name);
            return Err(ProviderError::InstanceNotFound);
        };
        let system_uuid = system_uuid.to_lowercase();

        let claims = self.metal.list_server_claims().await.map_err(|e| {
            ProviderError::remote(format!("failed to list server claims for node {}", node_name), e)
        })?;

        let mut matches = Vec::new();
        for claim in claims {
            let Some(server_name) = claim.server_name() else {
                continue;
            };
            let server = match self.metal.get_server(server_name).await {
                Ok(server) => server,
                Err(e) if e.is_not_found() => {
                    warn!(
                        "Server {} referenced by claim {} does not exist",
                        server_name,
                        ObjectKey::from_resource(&claim)
                    );
                    continue;
                }
                Err(e) => {
                    return Err(ProviderError::remote(
                        format!("failed to get server {} for node {}", server_name, node_name),
                        e,
                    ));
                }
            };
            if server.system_uuid().to_lowercase() == system_uuid {
                matches.push(claim);
            }
        }

        match matches.len() {
            0 => {
                debug!("No server claim matches system UUID {} of node {}", system_uuid, node_name);
                Err(ProviderError::InstanceNotFound)
            }
            1 => Ok(matches.remove(0)),
            _ => Err(ProviderError::AmbiguousClaims {
                system_uuid,
                claims: matches
                    .iter()
                    .map(|claim| ObjectKey::from_resource(claim).to_string())
                    .collect(),
            }),
        }
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("namespace", &self.metal.namespace())
            .finish()
    }
}
