//! Cluster store errors

use thiserror::Error;

/// Errors that can occur when reading or patching cluster objects
#[derive(Debug, Error)]
pub enum ClientError {
    /// Kubernetes API request failed
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// The requested object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object or patch could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// True when the object was absent, as opposed to the request failing
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}
