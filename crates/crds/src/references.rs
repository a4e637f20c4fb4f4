//! Object references used by the metal resources
//!
//! Mirrors the Kubernetes `LocalObjectReference` and `TypedLocalObjectReference` shapes so
//! the serialized form matches what the metal operator and Cluster API write.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to a cluster-scoped or same-namespace object by name
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectReference {
    /// Name of the referenced object
    pub name: String,
}

impl LocalObjectReference {
    /// Create a reference to the named object
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Reference to an object of an explicit API group and kind
///
/// Follows the Kubernetes `TypedLocalObjectReference` pattern. An absent `apiGroup` means
/// the core group.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypedLocalObjectReference {
    /// API group of the referenced resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,

    /// Kind of the referenced resource
    pub kind: String,

    /// Name of the referenced resource
    pub name: String,
}
