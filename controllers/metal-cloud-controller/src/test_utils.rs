//! Test utilities for unit testing the provider and reconcilers
//!
//! Fixture builders for nodes, servers, claims and IPAM objects.

use crds::{
    IP, IPAddress, IPAddressClaim, IPAddressClaimSpec, IPAddressClaimStatus, IPAddressSpec, IPSpec,
    IPState, IPStatus, LocalObjectReference, NetworkInterface, Power, SERVER_CLAIM_NAME_LABEL,
    SERVER_CLAIM_NAMESPACE_LABEL, Server, ServerClaim, ServerClaimSpec, ServerPowerState,
    ServerSpec, ServerStatus, TypedLocalObjectReference,
};
use k8s_openapi::api::core::v1::{Node, NodeAddress, NodeSpec, NodeStatus, NodeSystemInfo};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;

/// Node reporting `system_uuid`, without a provider ID
pub fn node(name: &str, system_uuid: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(NodeSpec::default()),
        status: Some(NodeStatus {
            node_info: Some(NodeSystemInfo {
                system_uuid: system_uuid.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
    }
}

/// Node already carrying a provider ID
pub fn node_with_provider_id(name: &str, provider_id: &str) -> Node {
    let mut node = node(name, "");
    node.spec = Some(NodeSpec {
        provider_id: Some(provider_id.to_string()),
        ..Default::default()
    });
    node
}

/// Add reported addresses of type `InternalIP`
pub fn with_internal_ips(mut node: Node, addresses: &[&str]) -> Node {
    let status = node.status.get_or_insert_with(Default::default);
    let reported = status.addresses.get_or_insert_with(Vec::new);
    reported.extend(addresses.iter().map(|address| NodeAddress {
        address: address.to_string(),
        type_: "InternalIP".to_string(),
    }));
    node
}

/// Add a reported address of another type
pub fn with_address(mut node: Node, type_: &str, address: &str) -> Node {
    let status = node.status.get_or_insert_with(Default::default);
    status.addresses.get_or_insert_with(Vec::new).push(NodeAddress {
        address: address.to_string(),
        type_: type_.to_string(),
    });
    node
}

/// Set the node's pod address block
pub fn with_pod_cidr(mut node: Node, cidr: &str) -> Node {
    let spec = node.spec.get_or_insert_with(Default::default);
    spec.pod_cidr = Some(cidr.to_string());
    spec.pod_cidrs = Some(vec![cidr.to_string()]);
    node
}

/// Add labels to any resource
pub fn with_labels<K: Resource>(mut obj: K, labels: &[(&str, &str)]) -> K {
    let current = obj.meta_mut().labels.get_or_insert_with(Default::default);
    for (key, value) in labels {
        current.insert(key.to_string(), value.to_string());
    }
    obj
}

/// Add annotations to any resource
pub fn with_annotations<K: Resource>(mut obj: K, annotations: &[(&str, &str)]) -> K {
    let current = obj.meta_mut().annotations.get_or_insert_with(Default::default);
    for (key, value) in annotations {
        current.insert(key.to_string(), value.to_string());
    }
    obj
}

/// Server with hardware UUID `system_uuid`
pub fn server(name: &str, system_uuid: &str) -> Server {
    let mut server = Server::new(
        name,
        ServerSpec {
            system_uuid: system_uuid.to_string(),
            uuid: String::new(),
            power: None,
        },
    );
    server.status = Some(ServerStatus::default());
    server
}

/// Server reporting `interfaces`
pub fn server_with_interfaces(name: &str, interfaces: Vec<NetworkInterface>) -> Server {
    let mut server = server(name, "");
    server.status = Some(ServerStatus {
        power_state: None,
        network_interfaces: interfaces,
    });
    server
}

/// Set the power state the server reports
pub fn with_power_state(mut server: Server, state: ServerPowerState) -> Server {
    server.status.get_or_insert_with(Default::default).power_state = Some(state);
    server
}

/// Server claim with desired power `On`
pub fn server_claim(namespace: &str, name: &str, server_ref: Option<&str>) -> ServerClaim {
    let mut claim = ServerClaim::new(
        name,
        ServerClaimSpec {
            power: Power::On,
            server_ref: server_ref.map(LocalObjectReference::new),
            image: None,
        },
    );
    claim.metadata.namespace = Some(namespace.to_string());
    claim
}

/// Set the claim's desired power
pub fn with_power(mut claim: ServerClaim, power: Power) -> ServerClaim {
    claim.spec.power = power;
    claim
}

/// `IP` object in `state`
pub fn metal_ip(namespace: &str, name: &str, state: IPState, reserved: Option<&str>) -> IP {
    let mut ip = IP::new(name, IPSpec::default());
    ip.metadata.namespace = Some(namespace.to_string());
    ip.status = Some(IPStatus {
        state,
        reserved: reserved.map(str::to_string),
        message: None,
    });
    ip
}

/// `IPAddressClaim` labelled as belonging to server claim `owner`
pub fn ip_address_claim(namespace: &str, name: &str, owner: &str, address: Option<&str>) -> IPAddressClaim {
    let mut claim = IPAddressClaim::new(
        name,
        IPAddressClaimSpec {
            pool_ref: pool_ref(),
        },
    );
    claim.metadata.namespace = Some(namespace.to_string());
    claim.status = Some(IPAddressClaimStatus {
        address_ref: address.map(LocalObjectReference::new),
    });
    with_labels(
        claim,
        &[
            (SERVER_CLAIM_NAME_LABEL, owner),
            (SERVER_CLAIM_NAMESPACE_LABEL, namespace),
        ],
    )
}

/// `IPAddress` carrying `address`
pub fn ip_address(namespace: &str, name: &str, address: &str) -> IPAddress {
    let mut ip = IPAddress::new(
        name,
        IPAddressSpec {
            claim_ref: LocalObjectReference::new(name),
            pool_ref: pool_ref(),
            address: address.to_string(),
            prefix: 24,
            gateway: None,
        },
    );
    ip.metadata.namespace = Some(namespace.to_string());
    ip
}

fn pool_ref() -> TypedLocalObjectReference {
    TypedLocalObjectReference {
        api_group: Some("ipam.cluster.x-k8s.io".to_string()),
        kind: "GlobalInClusterIPPool".to_string(),
        name: "workers".to_string(),
    }
}
