//! Unit tests for the ServerClaim reconciler

#[cfg(test)]
mod tests {
    use super::super::{Reconcile, ServerClaimReconciler};
    use crate::constants::LABEL_KEY_MAINTENANCE_NEEDED;
    use crate::error::ProviderError;
    use crate::test_utils::*;
    use metal_client::{MockMetalClient, MockWorkloadClient, ObjectKey};
    use serde_json::json;
    use std::sync::Arc;

    fn reconciler(metal: &MockMetalClient, workload: &MockWorkloadClient) -> ServerClaimReconciler {
        ServerClaimReconciler::new(Arc::new(metal.clone()), Arc::new(workload.clone()))
    }

    fn claim_key() -> ObjectKey {
        ObjectKey::namespaced("metal", "claim-a")
    }

    fn node_label(workload: &MockWorkloadClient, name: &str) -> Option<String> {
        workload
            .node(name)
            .and_then(|node| node.metadata.labels)
            .and_then(|labels| labels.get(LABEL_KEY_MAINTENANCE_NEEDED).cloned())
    }

    #[tokio::test]
    async fn test_maintenance_needed_mirrored_onto_node() {
        let metal = MockMetalClient::new("metal");
        let workload = MockWorkloadClient::new();
        metal.add_server_claim(with_labels(
            server_claim("metal", "claim-a", Some("server-a")),
            &[(LABEL_KEY_MAINTENANCE_NEEDED, "true")],
        ));
        workload.add_node(node_with_provider_id("node-a", "metal://metal/claim-a"));
        workload.add_node(node_with_provider_id("node-b", "metal://metal/claim-b"));
        let reconciler = reconciler(&metal, &workload);

        reconciler.reconcile(&claim_key()).await.unwrap();
        assert_eq!(
            workload.node_patches(),
            vec![(
                "node-a".to_string(),
                json!({"metadata": {"labels": {LABEL_KEY_MAINTENANCE_NEEDED: "true"}}})
            )]
        );
        assert_eq!(node_label(&workload, "node-a").as_deref(), Some("true"));
        assert_eq!(node_label(&workload, "node-b"), None);

        workload.clear_patches();
        reconciler.reconcile(&claim_key()).await.unwrap();
        assert!(workload.node_patches().is_empty());
    }

    #[tokio::test]
    async fn test_value_is_mirrored_verbatim() {
        let metal = MockMetalClient::new("metal");
        let workload = MockWorkloadClient::new();
        metal.add_server_claim(with_labels(
            server_claim("metal", "claim-a", Some("server-a")),
            &[(LABEL_KEY_MAINTENANCE_NEEDED, "scheduled")],
        ));
        workload.add_node(node_with_provider_id("node-a", "metal://metal/claim-a"));

        reconciler(&metal, &workload).reconcile(&claim_key()).await.unwrap();
        assert_eq!(node_label(&workload, "node-a").as_deref(), Some("scheduled"));
    }

    #[tokio::test]
    async fn test_label_removed_when_claim_clears_it() {
        let metal = MockMetalClient::new("metal");
        let workload = MockWorkloadClient::new();
        metal.add_server_claim(server_claim("metal", "claim-a", Some("server-a")));
        workload.add_node(with_labels(
            node_with_provider_id("node-a", "metal://metal/claim-a"),
            &[(LABEL_KEY_MAINTENANCE_NEEDED, "true"), ("role", "worker")],
        ));

        reconciler(&metal, &workload).reconcile(&claim_key()).await.unwrap();
        assert_eq!(
            workload.node_patches(),
            vec![(
                "node-a".to_string(),
                json!({"metadata": {"labels": {LABEL_KEY_MAINTENANCE_NEEDED: null}}})
            )]
        );
        assert_eq!(node_label(&workload, "node-a"), None);
        let labels = workload.node("node-a").unwrap().metadata.labels.unwrap();
        assert_eq!(labels.get("role").map(String::as_str), Some("worker"));
    }

    #[tokio::test]
    async fn test_no_matching_node_is_a_no_op() {
        let metal = MockMetalClient::new("metal");
        let workload = MockWorkloadClient::new();
        metal.add_server_claim(with_labels(
            server_claim("metal", "claim-a", Some("server-a")),
            &[(LABEL_KEY_MAINTENANCE_NEEDED, "true")],
        ));
        workload.add_node(node("node-a", "aaaa-0001"));
        let reconciler = reconciler(&metal, &workload);

        reconciler.reconcile(&claim_key()).await.unwrap();
        reconciler.reconcile(&ObjectKey::namespaced("metal", "claim-gone")).await.unwrap();
        assert!(workload.node_patches().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_nodes_is_an_error() {
        let metal = MockMetalClient::new("metal");
        let workload = MockWorkloadClient::new();
        metal.add_server_claim(with_labels(
            server_claim("metal", "claim-a", Some("server-a")),
            &[(LABEL_KEY_MAINTENANCE_NEEDED, "true")],
        ));
        workload.add_node(node_with_provider_id("node-a", "metal://metal/claim-a"));
        workload.add_node(node_with_provider_id("node-a2", "metal://metal/claim-a"));

        let err = reconciler(&metal, &workload).reconcile(&claim_key()).await.unwrap_err();
        match &err {
            ProviderError::DuplicateNodes { provider_id, count } => {
                assert_eq!(provider_id, "metal://metal/claim-a");
                assert_eq!(*count, 2);
            }
            other => panic!("expected DuplicateNodes, got {:?}", other),
        }
        assert!(err.is_retryable());
        assert!(workload.node_patches().is_empty());
    }
}
