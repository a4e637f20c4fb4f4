//! Cluster API IPAM CRDs (`ipam.cluster.x-k8s.io`)
//!
//! Claim/address pair allocation: an `IPAddressClaim` labelled with the owning server
//! claim is fulfilled by the IPAM provider, which creates an `IPAddress` and points the
//! claim's `status.addressRef` at it.

use crate::references::{LocalObjectReference, TypedLocalObjectReference};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of the Cluster API IPAM contract
pub const CAPI_IPAM_GROUP: &str = "ipam.cluster.x-k8s.io";

/// Label on an `IPAddressClaim` naming the owning server claim
pub const SERVER_CLAIM_NAME_LABEL: &str = "metal.ironcore.dev/server-claim-name";

/// Label on an `IPAddressClaim` naming the owning server claim's namespace
pub const SERVER_CLAIM_NAMESPACE_LABEL: &str = "metal.ironcore.dev/server-claim-namespace";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ipam.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "IPAddressClaim",
    namespaced,
    status = "IPAddressClaimStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct IPAddressClaimSpec {
    /// Pool the address is requested from
    pub pool_ref: TypedLocalObjectReference,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IPAddressClaimStatus {
    /// The `IPAddress` fulfilling this claim, set by the IPAM provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_ref: Option<LocalObjectReference>,
}

impl IPAddressClaim {
    /// Name of the resolved `IPAddress`, if the provider has fulfilled the claim
    pub fn address_name(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.address_ref.as_ref())
            .map(|r| r.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ipam.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "IPAddress",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IPAddressSpec {
    /// The claim this address was allocated for
    pub claim_ref: LocalObjectReference,

    /// Pool the address was allocated from
    pub pool_ref: TypedLocalObjectReference,

    /// The allocated address
    pub address: String,

    /// Prefix length of the pool
    pub prefix: u8,

    /// Gateway of the pool, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}
