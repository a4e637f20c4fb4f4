//! Node address resolution
//!
//! Produces the internal addresses reported for a node, from one of the backends the
//! cloud config selects. Backends that allocate through IPAM fail with
//! [`ProviderError::AddressNotAllocated`] until every address is allocated, so a node is
//! never initialized with a partial address list.

use crate::config::AddressBackend;
use crate::constants::{LABEL_KEY_SERVER_CLAIM_NAME, LABEL_KEY_SERVER_CLAIM_NAMESPACE, NODE_INTERNAL_IP};
use crate::error::ProviderError;
use crds::{Server, ServerClaim};
use k8s_openapi::api::core::v1::NodeAddress;
use kube::ResourceExt;
use metal_client::{MetalClientTrait, ObjectKey};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

fn internal_ip(address: impl Into<String>) -> NodeAddress {
    NodeAddress {
        address: address.into(),
        type_: NODE_INTERNAL_IP.to_string(),
    }
}

/// Resolves node addresses for a server claim
#[derive(Clone)]
pub struct AddressResolver {
    backend: AddressBackend,
    metal: Arc<dyn MetalClientTrait>,
}

impl AddressResolver {
    pub fn new(backend: AddressBackend, metal: Arc<dyn MetalClientTrait>) -> Self {
        Self { backend, metal }
    }

    pub fn backend(&self) -> AddressBackend {
        self.backend
    }

    /// Internal addresses of the node backed by `claim` and `server`
    pub async fn node_addresses(
        &self,
        server: &Server,
        claim: &ServerClaim,
    ) -> Result<Vec<NodeAddress>, ProviderError> {
        match self.backend {
            AddressBackend::Disabled => Ok(Vec::new()),
            AddressBackend::ReportedInterfaces => Ok(server
                .network_interfaces()
                .iter()
                .filter_map(|nic| nic.address())
                .map(internal_ip)
                .collect()),
            AddressBackend::MetalIp => self.metal_ip(claim).await,
            AddressBackend::ClusterApi => self.cluster_api_addresses(claim).await,
        }
    }

    /// The `IP` object named after the claim
    async fn metal_ip(&self, claim: &ServerClaim) -> Result<Vec<NodeAddress>, ProviderError> {
        let key = ObjectKey::from_resource(claim);
        let ip = match self.metal.get_ip(&key).await {
            Ok(ip) => ip,
            Err(e) if e.is_not_found() => {
                return Err(ProviderError::AddressNotAllocated(format!("IP {} does not exist", key)));
            }
            Err(e) => return Err(ProviderError::remote(format!("failed to get IP {}", key), e)),
        };
        let address = ip
            .allocated_address()
            .ok_or_else(|| ProviderError::AddressNotAllocated(format!("IP {} is not allocated", key)))?;
        debug!("Claim {} has address {} from IP object", key, address);
        Ok(vec![internal_ip(address)])
    }

    /// Every `IPAddress` referenced by the address claims labelled with the claim
    async fn cluster_api_addresses(&self, claim: &ServerClaim) -> Result<Vec<NodeAddress>, ProviderError> {
        let key = ObjectKey::from_resource(claim);
        let namespace = key.namespace.clone().unwrap_or_else(|| self.metal.namespace().to_string());
        let selector = BTreeMap::from([
            (LABEL_KEY_SERVER_CLAIM_NAME.to_string(), key.name.clone()),
            (LABEL_KEY_SERVER_CLAIM_NAMESPACE.to_string(), namespace.clone()),
        ]);

        let address_claims = self
            .metal
            .list_ip_address_claims(&namespace, &selector)
            .await
            .map_err(|e| ProviderError::remote(format!("failed to list IP address claims for {}", key), e))?;

        let mut addresses = Vec::with_capacity(address_claims.len());
        for address_claim in &address_claims {
            let Some(address_name) = address_claim.address_name() else {
                return Err(ProviderError::AddressNotAllocated(format!(
                    "IPAddressClaim {}/{} has no address yet",
                    namespace,
                    address_claim.name_any()
                )));
            };
            let address_key = ObjectKey::namespaced(
                address_claim.namespace().unwrap_or_else(|| namespace.clone()),
                address_name,
            );
            let address = self.metal.get_ip_address(&address_key).await.map_err(|e| {
                ProviderError::remote(format!("failed to get IPAddress {}", address_key), e)
            })?;
            addresses.push(internal_ip(address.spec.address));
        }
        debug!("Claim {} has {} addresses from IPAddress objects", key, addresses.len());
        Ok(addresses)
    }
}

impl std::fmt::Debug for AddressResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressResolver")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}
