//! Mock metal management cluster

use super::helpers::apply_merge_patch;
use crate::client_trait::MetalClientTrait;
use crate::error::ClientError;
use crate::key::ObjectKey;
use crds::{IP, IPAddress, IPAddressClaim, Server, ServerClaim};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Mock metal cluster client
///
/// Claims list in key order, which stands in for API listing order.
#[derive(Clone, Debug, Default)]
pub struct MockMetalClient {
    pub(crate) namespace: String,
    pub(crate) server_claims: Arc<Mutex<BTreeMap<ObjectKey, ServerClaim>>>,
    pub(crate) servers: Arc<Mutex<BTreeMap<String, Server>>>,
    pub(crate) ips: Arc<Mutex<BTreeMap<ObjectKey, IP>>>,
    pub(crate) ip_address_claims: Arc<Mutex<BTreeMap<ObjectKey, IPAddressClaim>>>,
    pub(crate) ip_addresses: Arc<Mutex<BTreeMap<ObjectKey, IPAddress>>>,
    pub(crate) claim_patches: Arc<Mutex<Vec<(ObjectKey, serde_json::Value)>>>,
    pub(crate) fail_patches: Arc<Mutex<bool>>,
}

impl MockMetalClient {
    /// Create a mock scoped to `namespace`
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Add a server claim (for test setup)
    ///
    /// Claims without a namespace are placed in the mock's namespace.
    pub fn add_server_claim(&self, mut claim: ServerClaim) {
        if claim.metadata.namespace.is_none() {
            claim.metadata.namespace = Some(self.namespace.clone());
        }
        let key = ObjectKey::from_resource(&claim);
        self.server_claims.lock().unwrap().insert(key, claim);
    }

    /// Add a server (for test setup)
    pub fn add_server(&self, server: Server) {
        self.servers.lock().unwrap().insert(server.name_any(), server);
    }

    /// Add an `IP` object (for test setup)
    pub fn add_ip(&self, ip: IP) {
        let key = ObjectKey::from_resource(&ip);
        self.ips.lock().unwrap().insert(key, ip);
    }

    /// Add an `IPAddressClaim` (for test setup)
    pub fn add_ip_address_claim(&self, claim: IPAddressClaim) {
        let key = ObjectKey::from_resource(&claim);
        self.ip_address_claims.lock().unwrap().insert(key, claim);
    }

    /// Add an `IPAddress` (for test setup)
    pub fn add_ip_address(&self, address: IPAddress) {
        let key = ObjectKey::from_resource(&address);
        self.ip_addresses.lock().unwrap().insert(key, address);
    }

    /// Current state of a server claim
    pub fn server_claim(&self, key: &ObjectKey) -> Option<ServerClaim> {
        self.server_claims.lock().unwrap().get(key).cloned()
    }

    /// Every patch applied to server claims, in order
    pub fn claim_patches(&self) -> Vec<(ObjectKey, serde_json::Value)> {
        self.claim_patches.lock().unwrap().clone()
    }

    /// Forget recorded patches
    pub fn clear_patches(&self) {
        self.claim_patches.lock().unwrap().clear();
    }

    /// Make subsequent patches fail as if the API server were unreachable
    pub fn set_fail_patches(&self, fail: bool) {
        *self.fail_patches.lock().unwrap() = fail;
    }
}

#[async_trait::async_trait]
impl MetalClientTrait for MockMetalClient {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn get_server_claim(&self, key: &ObjectKey) -> Result<ServerClaim, ClientError> {
        self.server_claim(key)
            .ok_or_else(|| ClientError::NotFound(format!("ServerClaim {}", key)))
    }

    async fn list_server_claims(&self) -> Result<Vec<ServerClaim>, ClientError> {
        Ok(self
            .server_claims
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.namespace.as_deref() == Some(self.namespace.as_str()))
            .map(|(_, claim)| claim.clone())
            .collect())
    }

    async fn patch_server_claim(&self, key: &ObjectKey, patch: &serde_json::Value) -> Result<ServerClaim, ClientError> {
        if *self.fail_patches.lock().unwrap() {
            return Err(ClientError::Kube(kube::Error::Service(
                format!("injected patch failure for ServerClaim {}", key).into(),
            )));
        }
        let mut claims = self.server_claims.lock().unwrap();
        let current = claims
            .get(key)
            .ok_or_else(|| ClientError::NotFound(format!("ServerClaim {}", key)))?;
        let patched = apply_merge_patch(current, patch)?;
        claims.insert(key.clone(), patched.clone());
        self.claim_patches.lock().unwrap().push((key.clone(), patch.clone()));
        Ok(patched)
    }

    async fn get_server(&self, name: &str) -> Result<Server, ClientError> {
        self.servers
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("Server {}", name)))
    }

    async fn get_ip(&self, key: &ObjectKey) -> Result<IP, ClientError> {
        self.ips
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("IP {}", key)))
    }

    async fn list_ip_address_claims(&self, namespace: &str, labels: &BTreeMap<String, String>) -> Result<Vec<IPAddressClaim>, ClientError> {
        Ok(self
            .ip_address_claims
            .lock()
            .unwrap()
            .values()
            .filter(|claim| claim.namespace().as_deref() == Some(namespace))
            .filter(|claim| {
                let claim_labels = claim.labels();
                labels.iter().all(|(k, v)| claim_labels.get(k) == Some(v))
            })
            .cloned()
            .collect())
    }

    async fn get_ip_address(&self, key: &ObjectKey) -> Result<IPAddress, ClientError> {
        self.ip_addresses
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("IPAddress {}", key)))
    }
}
