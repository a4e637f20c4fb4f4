//! Cluster store access for the metal cloud controller
//!
//! The controller talks to two independently administered API servers: the workload
//! cluster (Nodes) and the metal management cluster (servers, claims, IPAM objects).
//! Both are reached through a trait so reconcilers can be exercised against in-memory
//! stores.
//!
//! # Example
//!
//! ```no_run
//! use metal_client::{MetalClient, MetalClientTrait, ObjectKey};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let metal = MetalClient::new(client, "metal-tenant");
//!
//! let claim = metal.get_server_claim(&ObjectKey::namespaced("metal-tenant", "worker-0")).await?;
//! if let Some(server) = claim.server_name() {
//!     let server = metal.get_server(server).await?;
//!     println!("claim is bound to {}", server.system_uuid());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod key;
#[path = "trait.rs"]
pub mod client_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{MetalClient, WorkloadClient};
pub use client_trait::{MetalClientTrait, WorkloadClientTrait};
pub use error::ClientError;
pub use key::ObjectKey;
#[cfg(feature = "test-util")]
pub use mock::{MockMetalClient, MockWorkloadClient};
