//! Mock workload cluster

use super::helpers::apply_merge_patch;
use crate::client_trait::WorkloadClientTrait;
use crate::error::ClientError;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Mock workload cluster client
#[derive(Clone, Debug, Default)]
pub struct MockWorkloadClient {
    pub(crate) nodes: Arc<Mutex<BTreeMap<String, Node>>>,
    pub(crate) node_patches: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

impl MockWorkloadClient {
    /// Create an empty mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node (for test setup)
    pub fn add_node(&self, node: Node) {
        self.nodes.lock().unwrap().insert(node.name_any(), node);
    }

    /// Remove a node (for test setup)
    pub fn remove_node(&self, name: &str) {
        self.nodes.lock().unwrap().remove(name);
    }

    /// Current state of a node
    pub fn node(&self, name: &str) -> Option<Node> {
        self.nodes.lock().unwrap().get(name).cloned()
    }

    /// Every patch applied to nodes, in order
    pub fn node_patches(&self) -> Vec<(String, serde_json::Value)> {
        self.node_patches.lock().unwrap().clone()
    }

    /// Forget recorded patches
    pub fn clear_patches(&self) {
        self.node_patches.lock().unwrap().clear();
    }
}

#[async_trait::async_trait]
impl WorkloadClientTrait for MockWorkloadClient {
    async fn get_node(&self, name: &str) -> Result<Node, ClientError> {
        self.node(name)
            .ok_or_else(|| ClientError::NotFound(format!("Node {}", name)))
    }

    async fn list_nodes_by_provider_id(&self, provider_id: &str) -> Result<Vec<Node>, ClientError> {
        Ok(self
            .nodes
            .lock()
            .unwrap()
            .values()
            .filter(|node| {
                node.spec.as_ref().and_then(|s| s.provider_id.as_deref()) == Some(provider_id)
            })
            .cloned()
            .collect())
    }

    async fn patch_node(&self, name: &str, patch: &serde_json::Value) -> Result<Node, ClientError> {
        let mut nodes = self.nodes.lock().unwrap();
        let current = nodes
            .get(name)
            .ok_or_else(|| ClientError::NotFound(format!("Node {}", name)))?;
        let patched = apply_merge_patch(current, patch)?;
        nodes.insert(name.to_string(), patched.clone());
        self.node_patches.lock().unwrap().push((name.to_string(), patch.clone()));
        Ok(patched)
    }
}
