use crate::api::DiscoveryInfo;
use crate::client::network::{LocalDiscoverySource, NetworkCapability};
use crate::client::registry::{descriptor_from_registry, CloudRegistrySource};
use crate::credentials::{CredentialStore, ServerCredentials};
use crate::types::ServerDescriptor;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Number of discovery sources joined before delivery.
pub const DISCOVERY_SOURCE_COUNT: usize = 2;

/// Runs the local-network scan and the cloud registry lookup side by side and
/// folds both into the credential store.
///
/// Each source merges its results under the store snapshot's lock as soon as
/// it finishes. The snapshot is persisted and handed back only after both
/// sources have reported, so callers never see a partial merge.
pub struct DiscoveryAggregator {
    store: Arc<dyn CredentialStore>,
    local: Arc<dyn LocalDiscoverySource>,
    registry: Arc<dyn CloudRegistrySource>,
    network: Arc<dyn NetworkCapability>,
}

impl DiscoveryAggregator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        local: Arc<dyn LocalDiscoverySource>,
        registry: Arc<dyn CloudRegistrySource>,
        network: Arc<dyn NetworkCapability>,
    ) -> Self {
        Self {
            store,
            local,
            registry,
            network,
        }
    }

    /// Discover servers from every source and return all known descriptors.
    pub async fn discover(&self) -> Vec<ServerDescriptor> {
        log::debug!("Getting saved servers via credential store");
        let credentials = self.store.load();
        let registry_session = credentials
            .registry_session()
            .map(|(user, token)| (user.to_string(), token.to_string()));

        let merged = Mutex::new(credentials);
        // Progress reporting only; join! is what waits for both sources
        let completed = AtomicUsize::new(0);

        let local = async {
            let found = self.scan_local().await;
            merge_found(&merged, &completed, "Local network", found);
        };
        let registry = async {
            let found = match &registry_session {
                Some((user, token)) => self.query_registry(user, token).await,
                None => {
                    log::debug!("No registry session, skipping cloud server list");
                    Vec::new()
                }
            };
            merge_found(&merged, &completed, "Registry", found);
        };
        futures::join!(local, registry);

        let credentials = merged.into_inner();
        if let Err(e) = self.store.save(&credentials) {
            log::warn!("Failed to save credentials after discovery: {}", e);
        }
        credentials.servers
    }

    async fn scan_local(&self) -> Vec<ServerDescriptor> {
        if !self.network.is_local_network_reachable().await {
            log::debug!("Local network unavailable, skipping scan");
            return Vec::new();
        }

        log::debug!("Scanning network for local servers");
        match self.local.scan().await {
            Ok(found) => found.into_iter().map(descriptor_from_discovery).collect(),
            Err(e) => {
                log::warn!("Local server scan failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn query_registry(&self, user_id: &str, token: &str) -> Vec<ServerDescriptor> {
        log::debug!("Getting server list from registry");
        match self.registry.list_servers(user_id, token).await {
            Ok(servers) => servers.into_iter().map(descriptor_from_registry).collect(),
            Err(e) => {
                log::warn!("Registry server list failed: {}", e);
                Vec::new()
            }
        }
    }
}

fn merge_found(
    merged: &Mutex<ServerCredentials>,
    completed: &AtomicUsize,
    source: &str,
    found: Vec<ServerDescriptor>,
) {
    let mut credentials = merged.lock();
    let count = found.len();
    for server in found {
        credentials.add_or_update_server(server);
    }
    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
    log::debug!(
        "{} discovery returned {} servers ({}/{} sources done)",
        source,
        count,
        done,
        DISCOVERY_SOURCE_COUNT
    );
}

/// Convert a broadcast reply into a descriptor for merging.
pub fn descriptor_from_discovery(info: DiscoveryInfo) -> ServerDescriptor {
    ServerDescriptor {
        id: info.id,
        name: info.name,
        local_address: Some(info.address),
        ..Default::default()
    }
}
