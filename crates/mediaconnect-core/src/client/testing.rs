//! In-memory collaborators for unit tests.

use crate::api::{DiscoveryInfo, RegistryServer};
use crate::client::config::ClientConfig;
use crate::client::manager::{Collaborators, ConnectionManager};
use crate::client::network::{LocalDiscoverySource, NetworkCapability};
use crate::client::registry::CloudRegistrySource;
use crate::client::transport::{public_info_url, system_info_url, HttpRequest, Method, Transport};
use crate::credentials::{MemoryCredentialStore, ServerCredentials};
use crate::error::ConnectError;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Ordered log of side effects shared between fakes.
pub(crate) type Journal = Arc<Mutex<Vec<String>>>;

pub(crate) fn public_info_json(id: &str, name: &str) -> String {
    serde_json::json!({ "Id": id, "ServerName": name, "Version": "10.8.13" }).to_string()
}

pub(crate) fn system_info_json(id: &str, name: &str, wan: Option<&str>) -> String {
    serde_json::json!({
        "Id": id,
        "ServerName": name,
        "WanAddress": wan,
        "OperatingSystem": "Linux",
    })
    .to_string()
}

/// Transport answering from a URL → response table. Unknown URLs fail like
/// a refused connection. When several responses are queued for one URL they
/// are consumed in order and the last one repeats.
#[derive(Default)]
pub(crate) struct FakeTransport {
    routes: Mutex<HashMap<String, VecDeque<Result<String, ConnectError>>>>,
    requests: Mutex<Vec<HttpRequest>>,
    journal: Journal,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn respond(&self, url: &str, body: impl Into<String>) {
        self.push(url, Ok(body.into()));
    }

    pub fn fail(&self, url: &str) {
        self.fail_with(url, ConnectError::Transport("connection refused".into()));
    }

    pub fn fail_with(&self, url: &str, error: ConnectError) {
        self.push(url, Err(error));
    }

    /// Answer the public probe at `address`.
    pub fn online(&self, address: &str, id: &str, name: &str) {
        self.respond(&public_info_url(address), public_info_json(id, name));
    }

    /// Accept any token on the authenticated endpoint at `address`.
    pub fn accepts_token(&self, address: &str, id: &str, name: &str) {
        self.respond(&system_info_url(address), system_info_json(id, name, None));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.url.clone()).collect()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url == url).count()
    }

    fn push(&self, url: &str, response: Result<String, ConnectError>) {
        self.routes
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<String, ConnectError> {
        let verb = match request.method {
            Method::Get => "GET",
            Method::Post => "POST",
        };
        self.journal.lock().push(format!("{} {}", verb, request.url));
        let url = request.url.clone();
        self.requests.lock().push(request);

        let mut routes = self.routes.lock();
        let Some(queue) = routes.get_mut(&url) else {
            return Err(ConnectError::Transport("connection refused".into()));
        };
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        response.unwrap_or_else(|| Err(ConnectError::Transport("connection refused".into())))
    }
}

/// Network whose wake sends take a little time and are journaled on
/// completion.
pub(crate) struct FakeNetwork {
    reachable: AtomicBool,
    failing: Mutex<HashSet<String>>,
    wakes: Mutex<Vec<(String, u16)>>,
    journal: Journal,
}

impl FakeNetwork {
    pub fn new(reachable: bool) -> Arc<Self> {
        Self::with_journal(reachable, Journal::default())
    }

    pub fn with_journal(reachable: bool, journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            reachable: AtomicBool::new(reachable),
            failing: Mutex::new(HashSet::new()),
            wakes: Mutex::new(Vec::new()),
            journal,
        })
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn fail_mac(&self, mac: &str) {
        self.failing.lock().insert(mac.to_string());
    }

    pub fn wakes(&self) -> Vec<(String, u16)> {
        self.wakes.lock().clone()
    }
}

#[async_trait]
impl NetworkCapability for FakeNetwork {
    async fn is_local_network_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    async fn send_wake(&self, mac_address: &str, port: u16) -> Result<(), ConnectError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.wakes.lock().push((mac_address.to_string(), port));
        self.journal.lock().push(format!("WAKE {}", mac_address));
        if self.failing.lock().contains(mac_address) {
            return Err(ConnectError::Transport("no route to host".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeLocalDiscovery {
    pub servers: Vec<DiscoveryInfo>,
    pub delay: Duration,
    pub fail: bool,
    pub finished: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeLocalDiscovery {
    pub fn returning(servers: Vec<DiscoveryInfo>) -> Self {
        Self {
            servers,
            ..Self::default()
        }
    }
}

#[async_trait]
impl LocalDiscoverySource for FakeLocalDiscovery {
    async fn scan(&self) -> Result<Vec<DiscoveryInfo>, ConnectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
        if self.fail {
            return Err(ConnectError::Transport("broadcast failed".into()));
        }
        Ok(self.servers.clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeRegistry {
    pub servers: Vec<RegistryServer>,
    pub delay: Duration,
    pub fail: bool,
    pub finished: AtomicBool,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FakeRegistry {
    pub fn returning(servers: Vec<RegistryServer>) -> Self {
        Self {
            servers,
            ..Self::default()
        }
    }
}

#[async_trait]
impl CloudRegistrySource for FakeRegistry {
    async fn list_servers(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<Vec<RegistryServer>, ConnectError> {
        self.calls
            .lock()
            .push((user_id.to_string(), access_token.to_string()));
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
        if self.fail {
            return Err(ConnectError::HttpStatus {
                url: "registry".into(),
                status: 500,
            });
        }
        Ok(self.servers.clone())
    }
}

pub(crate) fn test_config() -> ClientConfig {
    ClientConfig {
        app_name: "test-app".into(),
        app_version: "0.0.1".into(),
        device_id: "device-1".into(),
        device_name: "test-device".into(),
        ..ClientConfig::default()
    }
}

/// All fakes wired together, sharing one journal.
pub(crate) struct Harness {
    pub transport: Arc<FakeTransport>,
    pub network: Arc<FakeNetwork>,
    pub store: Arc<MemoryCredentialStore>,
    pub local: Arc<FakeLocalDiscovery>,
    pub registry: Arc<FakeRegistry>,
}

impl Harness {
    pub fn new(credentials: ServerCredentials) -> Self {
        Self::with_sources(credentials, FakeLocalDiscovery::default(), FakeRegistry::default())
    }

    pub fn with_sources(
        credentials: ServerCredentials,
        local: FakeLocalDiscovery,
        registry: FakeRegistry,
    ) -> Self {
        let transport = FakeTransport::new();
        let network = FakeNetwork::with_journal(true, transport.journal());
        Self {
            transport,
            network,
            store: Arc::new(MemoryCredentialStore::new(credentials)),
            local: Arc::new(local),
            registry: Arc::new(registry),
        }
    }

    pub fn journal(&self) -> Vec<String> {
        self.transport.journal().lock().clone()
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            store: self.store.clone(),
            transport: self.transport.clone(),
            network: self.network.clone(),
            local_discovery: self.local.clone(),
            registry: self.registry.clone(),
        }
    }

    pub fn manager(&self) -> ConnectionManager {
        ConnectionManager::new(test_config(), self.collaborators())
    }
}
