//! Controller-specific error types.
//!
//! This module defines the error taxonomy of the metal cloud controller. The host
//! framework distinguishes `InstanceNotFound` by variant; the reconcile runtime uses
//! `is_retryable` to decide between backoff and giving up on a key.

use metal_client::ClientError;
use thiserror::Error;

/// Errors that can occur in the metal cloud controller.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No server claim backs the node. Signals deregistration to the host framework.
    #[error("instance not found")]
    InstanceNotFound,

    /// Provider ID does not have the `metal://<namespace>/<name>` form
    #[error("Invalid provider ID: {0}")]
    InvalidProviderId(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A node reported an address that cannot be turned into a pod address block
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The address backend has not allocated an address for the claim yet
    #[error("Address not allocated: {0}")]
    AddressNotAllocated(String),

    /// The claim exists but no server is bound to it yet
    #[error("Server claim {0} is not bound to a server")]
    ServerNotBound(String),

    /// More than one server claim matches the node's hardware identifier
    #[error("Multiple server claims match system UUID {system_uuid}: {}", claims.join(", "))]
    AmbiguousClaims {
        /// Hardware identifier reported by the node
        system_uuid: String,
        /// Matching claims as namespace/name
        claims: Vec<String>,
    },

    /// More than one node carries the same provider ID
    #[error("Multiple nodes ({count}) found with provider ID {provider_id}")]
    DuplicateNodes {
        /// The shared provider ID
        provider_id: String,
        /// Number of nodes carrying it
        count: usize,
    },

    /// A call against the metal or workload cluster failed
    #[error("{context}: {source}")]
    Remote {
        /// What the controller was doing
        context: String,
        /// The underlying store error
        #[source]
        source: ClientError,
    },

    /// Kubernetes client construction or API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Cloud config could not be parsed
    #[error("Failed to parse cloud config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// A configuration or kubeconfig file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File being read
        path: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// The probe server could not bind or serve
    #[error("Probe server failed: {0}")]
    Probe(#[source] std::io::Error),

    /// Watch caches did not finish their initial sync
    #[error("Cache sync failed: {0}")]
    CacheSync(String),
}

impl ProviderError {
    /// Wrap a store error with the context of the call that hit it
    pub(crate) fn remote(context: impl Into<String>, source: ClientError) -> Self {
        ProviderError::Remote {
            context: context.into(),
            source,
        }
    }

    /// True when the underlying store reported the object as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::Remote { source, .. } if source.is_not_found())
    }

    /// True for failures worth retrying with backoff.
    ///
    /// Malformed input will not fix itself on retry; everything else is either transient
    /// or an inconsistency that another writer may resolve.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ProviderError::InvalidProviderId(_)
                | ProviderError::InvalidConfig(_)
                | ProviderError::InvalidAddress(_)
                | ProviderError::ConfigParse(_)
        )
    }
}
