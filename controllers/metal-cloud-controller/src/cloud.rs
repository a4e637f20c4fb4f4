//! Cloud provider facade
//!
//! Entry point the host framework registers under the name `metal`. Construction only
//! connects to the metal cluster; [`CloudProvider::initialize`] starts the informers,
//! waits for their caches and spawns both reconcilers.

use crate::addresses::AddressResolver;
use crate::backoff::ExponentialBackoff;
use crate::config::ProviderConfig;
use crate::constants::PROVIDER_NAME;
use crate::error::ProviderError;
use crate::instances::{InstancesV2, MetalInstances};
use crate::probes::Readiness;
use crate::reconciler::{self, NodeReconciler, ServerClaimReconciler};
use crate::watcher;
use crds::ServerClaim;
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client};
use kube_runtime::reflector::Store;
use metal_client::{MetalClient, MetalClientTrait, WorkloadClient, WorkloadClientTrait};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// The metal cloud provider
pub struct CloudProvider {
    config: ProviderConfig,
    metal: Arc<MetalClient>,
    readiness: Readiness,
    instances: Option<Arc<MetalInstances>>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl std::fmt::Debug for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudProvider")
            .field("cluster_name", &self.config.cloud.cluster_name)
            .field("metal", &self.metal)
            .field("initialized", &self.instances.is_some())
            .finish_non_exhaustive()
    }
}

impl CloudProvider {
    /// Connect to the metal cluster described by `config`
    pub async fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let (client_config, namespace) = config.metal_cluster().await?;
        let client = Client::try_from(client_config)?;
        info!("Using metal cluster namespace {}", namespace);
        Ok(Self::with_metal_client(config, client, namespace))
    }

    /// Use an already connected metal cluster client
    pub fn with_metal_client(config: ProviderConfig, client: Client, namespace: impl Into<String>) -> Self {
        Self {
            config,
            metal: Arc::new(MetalClient::new(client, namespace)),
            readiness: Readiness::new(),
            instances: None,
            tasks: Vec::new(),
        }
    }

    /// Start informers and reconcilers against the workload cluster
    ///
    /// Fails if the watch caches do not complete their initial sync within the configured
    /// timeout. Everything spawned here stops when `cancel` fires.
    pub async fn initialize(&mut self, workload_client: Client, cancel: CancellationToken) -> Result<(), ProviderError> {
        info!("Initializing {} cloud provider", PROVIDER_NAME);

        let (node_tx, node_rx) = mpsc::unbounded_channel();
        let (claim_tx, claim_rx) = mpsc::unbounded_channel();
        let (node_store, node_informer) =
            watcher::spawn(Api::<Node>::all(workload_client.clone()), node_tx, cancel.clone());
        let (claim_store, claim_informer) = watcher::spawn(
            Api::<ServerClaim>::namespaced(self.metal.kube_client().clone(), self.metal.namespace()),
            claim_tx,
            cancel.clone(),
        );
        self.tasks.push(("Node informer", node_informer));
        self.tasks.push(("ServerClaim informer", claim_informer));

        wait_for_cache_sync(&node_store, &claim_store, self.config.cache_sync_timeout).await?;
        self.readiness.mark_ready();

        let metal: Arc<dyn MetalClientTrait> = self.metal.clone();
        let workload: Arc<dyn WorkloadClientTrait> = Arc::new(WorkloadClient::new(workload_client, node_store));
        let addresses = AddressResolver::new(self.config.address_backend, Arc::clone(&metal));
        self.instances = Some(Arc::new(MetalInstances::new(
            Arc::clone(&metal),
            addresses,
            self.config.cloud.cluster_name.clone(),
        )));

        let backoff = ExponentialBackoff::new(self.config.reconciler_base_delay, self.config.reconciler_max_delay);
        let node_reconciler = NodeReconciler::new(Arc::clone(&workload), Arc::clone(&metal), self.config.pod_prefix());
        let claim_reconciler = ServerClaimReconciler::new(metal, workload);
        self.tasks.push((
            "Node reconciler",
            tokio::spawn(reconciler::run(Arc::new(node_reconciler), node_rx, backoff, cancel.clone())),
        ));
        self.tasks.push((
            "ServerClaim reconciler",
            tokio::spawn(reconciler::run(Arc::new(claim_reconciler), claim_rx, backoff, cancel)),
        ));

        info!("Initialized {} cloud provider", PROVIDER_NAME);
        Ok(())
    }

    /// Per-node query interface, available once initialized
    pub fn instances_v2(&self) -> Option<Arc<dyn InstancesV2>> {
        self.instances.clone().map(|instances| instances as Arc<dyn InstancesV2>)
    }

    pub fn has_cluster_id(&self) -> bool {
        true
    }

    pub fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    /// Readiness flag for the probe server
    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Wait for every informer and reconciler to stop
    pub async fn wait(self) {
        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                error!("{} task failed: {}", name, e);
            }
        }
    }
}

async fn wait_for_cache_sync(nodes: &Store<Node>, claims: &Store<ServerClaim>, timeout: Duration) -> Result<(), ProviderError> {
    info!("Waiting for Node and ServerClaim caches to sync");
    let synced = tokio::time::timeout(timeout, async {
        nodes.wait_until_ready().await?;
        claims.wait_until_ready().await
    })
    .await;
    match synced {
        Ok(Ok(())) => {
            info!("Caches synced");
            Ok(())
        }
        Ok(Err(e)) => Err(ProviderError::CacheSync(e.to_string())),
        Err(_) => Err(ProviderError::CacheSync(format!(
            "caches did not sync within {}s",
            timeout.as_secs()
        ))),
    }
}
