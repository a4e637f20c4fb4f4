//! Metal Cloud Controller
//!
//! Connects a workload cluster's Nodes to the servers and server claims of a metal
//! management cluster.
//!
//! - [`identity`] resolves a node to the server claim backing it
//! - [`instances`] answers the host framework's per-node queries and converges the
//!   claim's cluster label and desired power
//! - [`addresses`] resolves node addresses from the configured backend
//! - [`reconciler`] runs the Node and ServerClaim reconcilers that exchange maintenance
//!   signals between the clusters and assign pod address blocks
//! - [`cloud`] wires everything together behind [`CloudProvider`]

pub mod addresses;
pub mod backoff;
pub mod cidr;
pub mod cloud;
pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod instances;
pub mod patch;
pub mod probes;
pub mod provider_id;
pub mod reconciler;
#[cfg(test)]
mod test_utils;
pub mod watcher;
pub mod workqueue;

pub use cloud::CloudProvider;
pub use config::{AddressBackend, CloudConfig, ProviderConfig};
pub use error::ProviderError;
pub use instances::{InstanceMetadata, InstancesV2, MetalInstances};
