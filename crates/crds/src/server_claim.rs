//! ServerClaim CRD
//!
//! A tenant's exclusive hold on one server. The claim is the object the cloud controller
//! labels and whose desired power it converges.

use crate::references::LocalObjectReference;
use crate::server::Power;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Set by the maintenance pipeline when the claimed server needs maintenance
pub const MAINTENANCE_NEEDED_LABEL: &str = "metal.ironcore.dev/maintenance-needed";

/// Operator consent for maintenance, read from nodes and written to claims
pub const MAINTENANCE_APPROVAL_LABEL: &str = "metal.ironcore.dev/maintenance-approval";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "metal.ironcore.dev",
    version = "v1alpha1",
    kind = "ServerClaim",
    namespaced,
    status = "ServerClaimStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ServerClaimSpec {
    /// Desired power of the claimed server
    pub power: Power,

    /// The server bound to this claim, unset until the claim is bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_ref: Option<LocalObjectReference>,

    /// Boot image requested for the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerClaimStatus {
    /// Claim phase (Bound, Unbound)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl ServerClaim {
    /// Name of the bound server, if any
    pub fn server_name(&self) -> Option<&str> {
        self.spec.server_ref.as_ref().map(|r| r.name.as_str())
    }

    /// Value of a label on the claim
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }
}
