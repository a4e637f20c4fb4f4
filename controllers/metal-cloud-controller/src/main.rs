//! Metal Cloud Controller Manager
//!
//! Runs the metal cloud provider against the workload cluster the process is deployed
//! in. Configuration comes from the environment:
//!
//! - `CLOUD_CONFIG`: path to the cloud config YAML (required)
//! - `METAL_KUBECONFIG`: kubeconfig of the metal cluster (in-cluster config if unset)
//! - `METAL_NAMESPACE`: namespace of the server claims, overriding the kubeconfig
//! - `POD_PREFIX_SIZE`: prefix length of pod address blocks (unset or 0 disables)
//! - `PROBE_ADDR`: probe listen address (default `0.0.0.0:10258`)

use anyhow::Context;
use metal_cloud_controller::{CloudProvider, ProviderConfig, probes};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // kube's rustls backend needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Metal Cloud Controller Manager");

    let config = ProviderConfig::from_env().context("failed to load configuration")?;
    info!("Configuration:");
    info!("  Cluster name: {}", config.cloud.cluster_name);
    info!("  Address backend: {:?}", config.address_backend);
    info!(
        "  Metal kubeconfig: {}",
        config
            .metal_kubeconfig
            .as_deref()
            .map_or_else(|| "in-cluster".to_string(), |p| p.display().to_string())
    );
    info!("  Pod prefix size: {}", config.pod_prefix_size);

    let probe_addr = config.probe_addr;
    let workload_client = kube::Client::try_default()
        .await
        .context("failed to connect to the workload cluster")?;
    let mut provider = CloudProvider::new(config)
        .await
        .context("failed to connect to the metal cluster")?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let probes = tokio::spawn(probes::serve(probe_addr, provider.readiness(), cancel.clone()));

    if let Err(e) = provider.initialize(workload_client, cancel.clone()).await {
        cancel.cancel();
        return Err(e).context("failed to initialize cloud provider");
    }
    info!(
        "Cloud provider {} running (cluster ID: {})",
        provider.provider_name(),
        provider.has_cluster_id()
    );

    cancel.cancelled().await;
    provider.wait().await;
    match probes.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("{}", e),
        Err(e) => error!("Probe server task failed: {}", e),
    }
    info!("Metal Cloud Controller Manager stopped");
    Ok(())
}

/// Cancel `cancel` on Ctrl-C or SIGTERM
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
    cancel.cancel();
}
