//! Controller configuration
//!
//! Configuration is an explicit value threaded through constructors: the cloud config
//! YAML describes the workload cluster and its networking, environment variables locate
//! the metal cluster and tune the runtime.

use crate::error::ProviderError;
use crds::{CAPI_IPAM_GROUP, METAL_IPAM_GROUP};
use kube::config::{KubeConfigOptions, Kubeconfig};
use serde::Deserialize;
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_PROBE_ADDR: &str = "0.0.0.0:10258";
const DEFAULT_CACHE_SYNC_TIMEOUT_SECS: u64 = 120;
const DEFAULT_BASE_DELAY_SECS: u64 = 5;
const DEFAULT_MAX_DELAY_SECS: u64 = 300;

/// IPAM resources in use for node addresses
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IpamKind {
    /// API group of the address object
    pub api_group: String,
    /// Kind of the address object
    pub kind: String,
}

/// Networking section of the cloud config
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Networking {
    /// Whether the controller reports node addresses at all
    #[serde(default)]
    pub configure_node_addresses: bool,
    /// Address backend; absent means "use the server's reported interfaces"
    #[serde(default)]
    pub ipam_kind: Option<IpamKind>,
}

/// Cloud config file contents
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CloudConfig {
    /// Name of the workload cluster, stamped onto server claims
    #[serde(default)]
    pub cluster_name: String,
    /// Node address configuration
    #[serde(default)]
    pub networking: Networking,
}

impl CloudConfig {
    /// Parse and validate a cloud config document
    pub fn from_reader(reader: impl Read) -> Result<Self, ProviderError> {
        let config: CloudConfig = serde_yaml::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.cluster_name.is_empty() {
            return Err(ProviderError::InvalidConfig(
                "clusterName missing in cloud config".to_string(),
            ));
        }
        Ok(())
    }
}

/// How node addresses are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressBackend {
    /// Node addresses are not configured by this controller
    Disabled,
    /// One internal address per interface reported on the server
    ReportedInterfaces,
    /// One `IP` object (`ipam.metal.ironcore.dev`) named after the server claim
    MetalIp,
    /// `IPAddressClaim`/`IPAddress` pairs (`ipam.cluster.x-k8s.io`) labelled with the claim
    ClusterApi,
}

impl AddressBackend {
    /// Select the backend described by the networking config
    pub fn from_networking(networking: &Networking) -> Result<Self, ProviderError> {
        if !networking.configure_node_addresses {
            return Ok(AddressBackend::Disabled);
        }
        let Some(kind) = &networking.ipam_kind else {
            return Ok(AddressBackend::ReportedInterfaces);
        };
        match (kind.api_group.as_str(), kind.kind.as_str()) {
            (METAL_IPAM_GROUP, "IP") => Ok(AddressBackend::MetalIp),
            (CAPI_IPAM_GROUP, "IPAddress") => Ok(AddressBackend::ClusterApi),
            (group, kind) => Err(ProviderError::InvalidConfig(format!(
                "unknown ipamKind {}/{} used for node address assignment",
                group, kind
            ))),
        }
    }
}

/// Everything the controller needs to run
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Parsed cloud config
    pub cloud: CloudConfig,
    /// Address backend selected from `cloud.networking`
    pub address_backend: AddressBackend,
    /// Kubeconfig of the metal cluster; `None` means in-cluster config
    pub metal_kubeconfig: Option<PathBuf>,
    /// Explicit metal namespace, overriding the kubeconfig context
    pub metal_namespace: Option<String>,
    /// Namespace the controller runs in, used with in-cluster config
    pub pod_namespace: Option<String>,
    /// Prefix length for pod address blocks; 0 disables assignment
    pub pod_prefix_size: u8,
    /// Listen address of the probe server
    pub probe_addr: SocketAddr,
    /// How long informers may take to complete their initial list
    pub cache_sync_timeout: Duration,
    /// First retry delay after a failed reconcile
    pub reconciler_base_delay: Duration,
    /// Retry delay cap
    pub reconciler_max_delay: Duration,
}

impl ProviderConfig {
    /// Config with runtime defaults around a cloud config
    pub fn new(cloud: CloudConfig) -> Result<Self, ProviderError> {
        cloud.validate()?;
        let address_backend = AddressBackend::from_networking(&cloud.networking)?;
        Ok(Self {
            cloud,
            address_backend,
            metal_kubeconfig: None,
            metal_namespace: None,
            pod_namespace: None,
            pod_prefix_size: 0,
            probe_addr: DEFAULT_PROBE_ADDR
                .parse()
                .map_err(|e| ProviderError::InvalidConfig(format!("probe address: {}", e)))?,
            cache_sync_timeout: Duration::from_secs(DEFAULT_CACHE_SYNC_TIMEOUT_SECS),
            reconciler_base_delay: Duration::from_secs(DEFAULT_BASE_DELAY_SECS),
            reconciler_max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
        })
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ProviderError> {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let path = var("CLOUD_CONFIG").ok_or_else(|| {
            ProviderError::InvalidConfig("CLOUD_CONFIG environment variable is required".to_string())
        })?;
        info!("Reading cloud config from {}", path);
        let file = std::fs::File::open(&path).map_err(|source| ProviderError::Io {
            path: path.clone(),
            source,
        })?;
        let mut config = Self::new(CloudConfig::from_reader(file)?)?;

        config.metal_kubeconfig = var("METAL_KUBECONFIG").map(PathBuf::from);
        config.metal_namespace = var("METAL_NAMESPACE");
        config.pod_namespace = var("NAMESPACE");
        if let Some(size) = var("POD_PREFIX_SIZE") {
            config.pod_prefix_size = parse_prefix_size(&size)?;
        }
        if let Some(addr) = var("PROBE_ADDR") {
            config.probe_addr = addr
                .parse()
                .map_err(|e| ProviderError::InvalidConfig(format!("PROBE_ADDR {}: {}", addr, e)))?;
        }
        if let Some(secs) = var("CACHE_SYNC_TIMEOUT_SECS") {
            config.cache_sync_timeout = parse_secs("CACHE_SYNC_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = var("RECONCILER_BASE_DELAY_SECS") {
            config.reconciler_base_delay = parse_secs("RECONCILER_BASE_DELAY_SECS", &secs)?;
        }
        if let Some(secs) = var("RECONCILER_MAX_DELAY_SECS") {
            config.reconciler_max_delay = parse_secs("RECONCILER_MAX_DELAY_SECS", &secs)?;
        }
        if config.reconciler_max_delay < config.reconciler_base_delay {
            return Err(ProviderError::InvalidConfig(
                "reconciler max delay is shorter than the base delay".to_string(),
            ));
        }
        Ok(config)
    }

    /// Pod address block prefix, `None` when assignment is disabled
    pub fn pod_prefix(&self) -> Option<u8> {
        (self.pod_prefix_size > 0).then_some(self.pod_prefix_size)
    }

    /// Client config and namespace for the metal cluster
    ///
    /// With a kubeconfig the namespace comes from the override or the current context;
    /// in-cluster it comes from the override or the controller's own namespace.
    pub async fn metal_cluster(&self) -> Result<(kube::Config, String), ProviderError> {
        let (client_config, namespace) = match &self.metal_kubeconfig {
            Some(path) => {
                debug!("Loading metal cluster kubeconfig from {}", path.display());
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    ProviderError::InvalidConfig(format!(
                        "unable to read metal cluster kubeconfig {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let client_config =
                    kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .map_err(|e| {
                            ProviderError::InvalidConfig(format!(
                                "unable to get metal cluster client config: {}",
                                e
                            ))
                        })?;
                let namespace = self
                    .metal_namespace
                    .clone()
                    .unwrap_or_else(|| client_config.default_namespace.clone());
                (client_config, namespace)
            }
            None => {
                let client_config = kube::Config::incluster().map_err(|e| {
                    ProviderError::InvalidConfig(format!("unable to load in-cluster config: {}", e))
                })?;
                let namespace = self
                    .metal_namespace
                    .clone()
                    .or_else(|| self.pod_namespace.clone())
                    .unwrap_or_default();
                (client_config, namespace)
            }
        };
        if namespace.is_empty() {
            return Err(ProviderError::InvalidConfig(
                "got an empty namespace for the metal cluster".to_string(),
            ));
        }
        Ok((client_config, namespace))
    }
}

fn parse_prefix_size(value: &str) -> Result<u8, ProviderError> {
    let size: i64 = value
        .trim()
        .parse()
        .map_err(|e| ProviderError::InvalidConfig(format!("POD_PREFIX_SIZE {}: {}", value, e)))?;
    if size <= 0 {
        return Ok(0);
    }
    u8::try_from(size)
        .ok()
        .filter(|size| *size <= 128)
        .ok_or_else(|| ProviderError::InvalidConfig(format!("POD_PREFIX_SIZE {} exceeds 128", size)))
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, ProviderError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ProviderError::InvalidConfig(format!("{} {}: {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const FULL_CONFIG: &str = r"
clusterName: prod-eu1
networking:
  configureNodeAddresses: true
  ipamKind:
    apiGroup: ipam.cluster.x-k8s.io
    kind: IPAddress
";

    #[test]
    fn test_parse_cloud_config() {
        let config = CloudConfig::from_reader(FULL_CONFIG.as_bytes()).unwrap();
        assert_eq!(config.cluster_name, "prod-eu1");
        assert!(config.networking.configure_node_addresses);
        assert_eq!(
            AddressBackend::from_networking(&config.networking).unwrap(),
            AddressBackend::ClusterApi
        );
    }

    #[test]
    fn test_missing_cluster_name_is_rejected() {
        let result = CloudConfig::from_reader("networking: {}".as_bytes());
        assert!(matches!(result, Err(ProviderError::InvalidConfig(_))));
    }

    #[test]
    fn test_address_backend_selection() {
        let mut networking = Networking::default();
        assert_eq!(AddressBackend::from_networking(&networking).unwrap(), AddressBackend::Disabled);

        networking.configure_node_addresses = true;
        assert_eq!(
            AddressBackend::from_networking(&networking).unwrap(),
            AddressBackend::ReportedInterfaces
        );

        networking.ipam_kind = Some(IpamKind {
            api_group: "ipam.metal.ironcore.dev".to_string(),
            kind: "IP".to_string(),
        });
        assert_eq!(AddressBackend::from_networking(&networking).unwrap(), AddressBackend::MetalIp);

        networking.ipam_kind = Some(IpamKind {
            api_group: "ipam.example.com".to_string(),
            kind: "Lease".to_string(),
        });
        assert!(matches!(
            AddressBackend::from_networking(&networking),
            Err(ProviderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_prefix_size_parsing() {
        assert_eq!(parse_prefix_size("24").unwrap(), 24);
        assert_eq!(parse_prefix_size("0").unwrap(), 0);
        assert_eq!(parse_prefix_size("-1").unwrap(), 0);
        assert!(parse_prefix_size("129").is_err());
        assert!(parse_prefix_size("abc").is_err());
    }

    #[test]
    fn test_from_lookup() {
        let mut file = tempfile_in_target("cloud-config-from-lookup.yaml");
        file.1.write_all(FULL_CONFIG.as_bytes()).unwrap();

        let env = HashMap::from([
            ("CLOUD_CONFIG", file.0.to_string_lossy().to_string()),
            ("METAL_NAMESPACE", "metal-tenant".to_string()),
            ("POD_PREFIX_SIZE", "24".to_string()),
            ("RECONCILER_BASE_DELAY_SECS", "1".to_string()),
            ("RECONCILER_MAX_DELAY_SECS", "30".to_string()),
        ]);
        let config = ProviderConfig::from_lookup(|key| env.get(key).cloned()).unwrap();

        assert_eq!(config.cloud.cluster_name, "prod-eu1");
        assert_eq!(config.metal_namespace.as_deref(), Some("metal-tenant"));
        assert_eq!(config.pod_prefix(), Some(24));
        assert_eq!(config.reconciler_base_delay, Duration::from_secs(1));
        assert_eq!(config.reconciler_max_delay, Duration::from_secs(30));
        assert_eq!(config.address_backend, AddressBackend::ClusterApi);
        std::fs::remove_file(&file.0).unwrap();
    }

    #[test]
    fn test_missing_cloud_config_path() {
        let result = ProviderConfig::from_lookup(|_| None);
        assert!(matches!(result, Err(ProviderError::InvalidConfig(_))));
    }

    fn tempfile_in_target(name: &str) -> (PathBuf, std::fs::File) {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        let file = std::fs::File::create(&path).unwrap();
        (path, file)
    }
}
