//! IP CRD (`ipam.metal.ironcore.dev`)
//!
//! Single-object address allocation: one `IP` per server claim, keyed by the claim's
//! namespace and name. The allocator moves `status.state` to `Finished` once an address is
//! reserved.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of the metal IPAM provider
pub const METAL_IPAM_GROUP: &str = "ipam.metal.ironcore.dev";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ipam.metal.ironcore.dev",
    version = "v1alpha1",
    kind = "IP",
    namespaced,
    status = "IPStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct IPSpec {
    /// Subnet to allocate from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,

    /// Requested address (hint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IPStatus {
    /// Allocation state
    #[serde(default)]
    pub state: IPState,

    /// Reserved address once allocation has finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved: Option<String>,

    /// Failure message from the allocator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// IP allocation state
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum IPState {
    #[default]
    Processing,
    Finished,
    Failed,
}

impl IP {
    /// The reserved address, only once allocation has finished
    pub fn allocated_address(&self) -> Option<&str> {
        let status = self.status.as_ref()?;
        if status.state != IPState::Finished {
            return None;
        }
        status.reserved.as_deref().filter(|ip| !ip.is_empty())
    }
}
