//! Well-known keys of the cross-cluster signaling contract

/// Name under which this cloud provider registers, and the provider-ID scheme
pub const PROVIDER_NAME: &str = "metal";

/// Label stamped onto server claims naming the workload cluster that uses them
pub const LABEL_KEY_CLUSTER_NAME: &str = "kubernetes.io/cluster";

/// Node annotation requesting the backing server be powered off (any value)
pub const ANNOTATION_POWER_OFF: &str = "metal.ironcore.dev/power-off";

/// Value written for boolean labels
pub const TRUE_STR: &str = "true";

/// Node address type for cluster-internal addresses
pub const NODE_INTERNAL_IP: &str = "InternalIP";

pub use crds::{
    INSTANCE_TYPE_LABEL as LABEL_KEY_INSTANCE_TYPE,
    MAINTENANCE_APPROVAL_LABEL as LABEL_KEY_MAINTENANCE_APPROVAL,
    MAINTENANCE_NEEDED_LABEL as LABEL_KEY_MAINTENANCE_NEEDED,
    REGION_LABEL as LABEL_KEY_REGION,
    SERVER_CLAIM_NAME_LABEL as LABEL_KEY_SERVER_CLAIM_NAME,
    SERVER_CLAIM_NAMESPACE_LABEL as LABEL_KEY_SERVER_CLAIM_NAMESPACE,
    ZONE_LABEL as LABEL_KEY_ZONE,
};
