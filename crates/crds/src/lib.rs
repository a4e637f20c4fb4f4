//! Metal cluster resource definitions
//!
//! Typed views of the resources the metal cloud controller reads and patches in the
//! metal management cluster. None of these kinds are owned here: the metal operator and
//! the IPAM providers install the CRDs, this crate only mirrors the fields we consume.

pub mod references;
pub mod server;
pub mod server_claim;
pub mod ipam;
pub mod capi;

pub use references::*;
pub use server::*;
pub use server_claim::*;
pub use ipam::*;
pub use capi::*;
