//! In-memory store clients for unit testing
//!
//! These mocks keep objects in memory, apply JSON merge patches the way the API server
//! would, and record every patch they receive so tests can assert on write counts.
//!
//! - `metal.rs` - metal management cluster (claims, servers, IPAM objects)
//! - `workload.rs` - workload cluster (nodes)
//! - `helpers.rs` - merge patch application

mod helpers;
mod metal;
mod workload;

pub use helpers::apply_merge_patch;
pub use metal::MockMetalClient;
pub use workload::MockWorkloadClient;
