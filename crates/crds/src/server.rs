//! Server CRD
//!
//! Cluster-scoped record of one physical machine: its hardware identity, the power state
//! the BMC reports, and the network interfaces discovered on it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label carrying the instance class of a server
pub const INSTANCE_TYPE_LABEL: &str = "instance-type";

/// Label carrying the zone a server is racked in
pub const ZONE_LABEL: &str = "zone";

/// Label carrying the region a server is racked in
pub const REGION_LABEL: &str = "region";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "metal.ironcore.dev",
    version = "v1alpha1",
    kind = "Server",
    status = "ServerStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
    /// Hardware UUID as reported by the machine firmware
    #[serde(rename = "systemUUID", default, skip_serializing_if = "String::is_empty")]
    pub system_uuid: String,

    /// Hardware UUID as serialized by older metal-operator releases
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,

    /// Power state requested by the metal operator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<Power>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    /// Power state reported by the BMC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_state: Option<ServerPowerState>,

    /// Network interfaces discovered on the server
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<NetworkInterface>,
}

/// Desired power of a server or server claim
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum Power {
    On,
    Off,
}

impl Power {
    /// Wire value as written into `spec.power`
    pub fn as_str(self) -> &'static str {
        match self {
            Power::On => "On",
            Power::Off => "Off",
        }
    }
}

/// Power state reported for a server
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ServerPowerState {
    On,
    Off,
    Paused,
    PoweringOn,
    PoweringOff,
    #[serde(other)]
    Unknown,
}

/// A network interface reported by the server discovery agent
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    /// Interface name
    pub name: String,

    /// Primary address (older discovery agents only report one)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// All addresses on the interface
    #[serde(default, rename = "ips", skip_serializing_if = "Vec::is_empty")]
    pub ips: Vec<String>,

    /// MAC address of the interface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

impl NetworkInterface {
    /// Primary address of the interface
    ///
    /// Falls back to the first entry of `ips` for agents that only fill the list.
    pub fn address(&self) -> Option<&str> {
        self.ip
            .as_deref()
            .or_else(|| self.ips.first().map(String::as_str))
            .filter(|ip| !ip.is_empty())
    }
}

impl Server {
    /// Hardware identifier, empty when discovery has not reported one
    ///
    /// Prefers `systemUUID` and falls back to the legacy `uuid` field.
    pub fn system_uuid(&self) -> &str {
        if self.spec.system_uuid.is_empty() {
            &self.spec.uuid
        } else {
            &self.spec.system_uuid
        }
    }

    /// Reported power state, if the BMC has reported one
    pub fn power_state(&self) -> Option<ServerPowerState> {
        self.status.as_ref().and_then(|s| s.power_state)
    }

    /// Reported network interfaces
    pub fn network_interfaces(&self) -> &[NetworkInterface] {
        self.status
            .as_ref()
            .map(|s| s.network_interfaces.as_slice())
            .unwrap_or_default()
    }
}
