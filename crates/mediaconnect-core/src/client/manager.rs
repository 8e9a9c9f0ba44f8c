use crate::api::AuthenticationResult;
use crate::client::api_client::{ClientRegistry, ServerClient};
use crate::client::auth::AuthValidator;
use crate::client::config::ClientConfig;
use crate::client::discovery::DiscoveryAggregator;
use crate::client::network::{LocalDiscoverySource, NetworkCapability, UdpNetwork, UdpServerLocator};
use crate::client::registry::{CloudRegistrySource, HttpRegistrySource};
use crate::client::resolver::ConnectionResolver;
use crate::client::transport::{ReqwestTransport, Transport};
use crate::client::types::{ConnectionEvent, ConnectionOutcome};
use crate::client::wake::{WakeCoordinator, WakeReport};
use crate::credentials::CredentialStore;
use crate::error::ConnectError;
use crate::types::{now_millis, sort_by_last_accessed, ConnectionMode, ServerDescriptor};

use futures::future::join_all;
use std::sync::Arc;

/// Everything the manager talks to outside of its own state.
pub struct Collaborators {
    pub store: Arc<dyn CredentialStore>,
    pub transport: Arc<dyn Transport>,
    pub network: Arc<dyn NetworkCapability>,
    pub local_discovery: Arc<dyn LocalDiscoverySource>,
    pub registry: Arc<dyn CloudRegistrySource>,
}

impl Collaborators {
    /// Real network stack: reqwest for HTTP, UDP for discovery and wake.
    pub fn standard(config: &ClientConfig, store: Arc<dyn CredentialStore>) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new());
        Self {
            registry: Arc::new(HttpRegistrySource::new(transport.clone(), config)),
            local_discovery: Arc::new(UdpServerLocator::new(
                config.discovery_port,
                config.discovery_timeout(),
            )),
            network: Arc::new(UdpNetwork),
            transport,
            store,
        }
    }
}

/// Entry point for connecting to media servers.
///
/// Owns the client handles and the event channel. Each `connect*` call is an
/// independent resolution cycle; concurrent calls are not coalesced.
pub struct ConnectionManager {
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    clients: Arc<ClientRegistry>,
    discovery: DiscoveryAggregator,
    resolver: ConnectionResolver,
    wake: WakeCoordinator,

    event_tx: async_channel::Sender<ConnectionEvent>,
    event_rx: async_channel::Receiver<ConnectionEvent>,
}

impl ConnectionManager {
    pub fn new(config: ClientConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            store,
            transport,
            network,
            local_discovery,
            registry,
        } = collaborators;

        let (event_tx, event_rx) = async_channel::bounded::<ConnectionEvent>(256);
        let authorization = config.authorization_header();
        let clients = Arc::new(ClientRegistry::new(transport.clone(), authorization.clone()));

        let discovery =
            DiscoveryAggregator::new(store.clone(), local_discovery, registry, network.clone());
        let resolver = ConnectionResolver::new(
            transport.clone(),
            store.clone(),
            AuthValidator::new(transport, authorization.clone()),
            WakeCoordinator::new(network.clone()),
            clients.clone(),
            event_tx.clone(),
            authorization,
            config.probe_timeout(),
        );

        Self {
            config,
            store,
            clients,
            discovery,
            resolver,
            wake: WakeCoordinator::new(network),
            event_tx,
            event_rx,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Receiver for connection events. Every clone shares the same queue.
    pub fn events(&self) -> async_channel::Receiver<ConnectionEvent> {
        self.event_rx.clone()
    }

    pub fn client(&self, server_id: &str) -> Option<ServerClient> {
        self.clients.get(server_id)
    }

    /// Saved servers, most recently used first.
    pub fn saved_servers(&self) -> Vec<ServerDescriptor> {
        let mut servers = self.store.load().servers;
        sort_by_last_accessed(&mut servers);
        servers
    }

    /// Discover servers, then connect to the best one.
    pub async fn connect(&self) -> ConnectionOutcome {
        log::info!("Connecting");
        let servers = self.discovery.discover().await;
        self.resolver.resolve(servers).await
    }

    /// Connect to a user-supplied address (scheme optional).
    pub async fn connect_address(&self, address: &str) -> Result<ConnectionOutcome, ConnectError> {
        log::info!("Connecting to address {}", address);
        self.resolver.connect_address(address).await
    }

    /// Connect to one specific server.
    pub async fn connect_server(&self, mut server: ServerDescriptor) -> ConnectionOutcome {
        log::info!("Connecting to server {}", server.name);
        self.resolver.connect_server(&mut server).await
    }

    /// Sign out of every server, then start over with a fresh `connect()`.
    pub async fn logout(&self) -> ConnectionOutcome {
        log::info!("Logging out of all servers");

        let signed_in = self
            .clients
            .all()
            .into_iter()
            .filter(ServerClient::is_authenticated);
        join_all(signed_in.map(|client| async move {
            if let Err(e) = client.logout().await {
                log::debug!("Server logout failed for {}: {}", client.server_id(), e);
            }
        }))
        .await;

        let mut credentials = self.store.load();
        credentials.clear_all_auth();
        if let Err(e) = self.store.save(&credentials) {
            log::warn!("Failed to save credentials after logout: {}", e);
        }
        self.emit(ConnectionEvent::LoggedOut);

        self.connect().await
    }

    /// Send wake-on-LAN to every saved server.
    pub async fn wake_all_servers(&self) -> WakeReport {
        let servers = self.store.load().servers;
        self.wake.wake_all(&servers).await
    }

    /// Record a sign-in made through a server's client handle.
    ///
    /// The handle always receives the new credential. The descriptor keeps it
    /// only when `save_credentials` is set.
    pub fn on_authenticated(
        &self,
        server_id: &str,
        result: &AuthenticationResult,
        save_credentials: bool,
    ) -> Result<ServerClient, ConnectError> {
        let Some(mut server) = self.store.load().server(server_id).cloned() else {
            return Err(ConnectError::InvalidArgument(format!(
                "unknown server {}",
                server_id
            )));
        };

        if save_credentials {
            server.set_auth(result.access_token.clone(), result.user.id.clone());
        } else {
            server.clear_auth();
        }
        server.date_last_accessed = now_millis();
        self.store
            .update_server(&server)
            .map_err(|e| ConnectError::Persist(e.to_string()))?;

        let (address, mode) = match self.clients.get(server_id) {
            Some(client) => (client.address(), client.mode()),
            None => {
                let mode = if server.local_address().is_some() {
                    ConnectionMode::Local
                } else {
                    ConnectionMode::Remote
                };
                let address = server.address_for(mode).map(str::to_string).ok_or_else(|| {
                    ConnectError::InvalidArgument(format!("server {} has no address", server_id))
                })?;
                (address, mode)
            }
        };
        let client = self.clients.get_or_add(&server, &address, mode);
        client.set_authentication_info(&result.access_token, Some(&result.user.id));

        log::info!("Signed in to {} as {}", server.name, result.user.name);
        self.emit(ConnectionEvent::SignedIn {
            server_id: server.id.clone(),
            user_id: Some(result.user.id.clone()),
            mode: Some(mode),
        });
        Ok(client)
    }

    fn emit(&self, event: ConnectionEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            log::debug!("Dropping connection event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DiscoveryInfo, UserDto};
    use crate::client::testing::{FakeLocalDiscovery, FakeRegistry, Harness};
    use crate::client::transport::{logout_url, public_info_url};
    use crate::credentials::ServerCredentials;
    use crate::types::{ConnectionState, WakeTarget};

    const LOCAL: &str = "http://10.0.0.5:8096";

    fn saved(id: &str, local: &str, token: Option<&str>, accessed: i64) -> ServerDescriptor {
        let mut s = ServerDescriptor {
            local_address: Some(local.to_string()),
            date_last_accessed: accessed,
            ..ServerDescriptor::new(id, format!("Server {}", id))
        };
        if let Some(token) = token {
            s.set_auth(token, "u1");
        }
        s
    }

    fn credentials(servers: Vec<ServerDescriptor>) -> ServerCredentials {
        ServerCredentials {
            servers,
            ..Default::default()
        }
    }

    fn auth_result(token: &str) -> AuthenticationResult {
        AuthenticationResult {
            access_token: token.into(),
            user: UserDto {
                id: "u2".into(),
                name: "alice".into(),
            },
            server_id: Some("s1".into()),
        }
    }

    fn drain(events: &async_channel::Receiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
        std::iter::from_fn(|| events.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn nothing_known_yields_empty_selection() {
        let h = Harness::new(ServerCredentials::default());
        let outcome = h.manager().connect().await;
        assert_eq!(outcome.state, ConnectionState::ServerSelection);
        assert!(outcome.servers.is_empty());
    }

    #[tokio::test]
    async fn discovered_server_is_reached_and_saved() {
        let h = Harness::with_sources(
            ServerCredentials::default(),
            FakeLocalDiscovery::returning(vec![DiscoveryInfo {
                id: "s1".into(),
                address: LOCAL.into(),
                name: "Den".into(),
            }]),
            FakeRegistry::default(),
        );
        h.transport.online(LOCAL, "s1", "Den");
        let manager = h.manager();

        let outcome = manager.connect().await;

        assert_eq!(outcome.state, ConnectionState::ServerSignIn);
        assert_eq!(outcome.server_ids(), vec!["s1"]);
        assert!(manager.client("s1").is_some());
        let stored = manager.saved_servers();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].date_last_accessed > 0);
    }

    #[tokio::test]
    async fn valid_saved_session_signs_in_and_emits_event() {
        let h = Harness::new(credentials(vec![saved("s1", LOCAL, Some("tok"), 10)]));
        h.transport.online(LOCAL, "s1", "Den");
        h.transport.accepts_token(LOCAL, "s1", "Den");
        let manager = h.manager();
        let events = manager.events();

        let outcome = manager.connect().await;

        assert_eq!(outcome.state, ConnectionState::SignedIn);
        assert_eq!(
            drain(&events),
            vec![ConnectionEvent::SignedIn {
                server_id: "s1".into(),
                user_id: Some("u1".into()),
                mode: Some(ConnectionMode::Local),
            }]
        );
    }

    #[tokio::test]
    async fn repeated_connect_is_stable() {
        let h = Harness::new(credentials(vec![
            saved("a", "http://a:8096", Some("ta"), 100),
            saved("b", "http://b:8096", Some("tb"), 200),
        ]));
        let manager = h.manager();

        let first = manager.connect().await;
        let second = manager.connect().await;

        assert_eq!(first.state, ConnectionState::ServerSelection);
        assert_eq!(first.state, second.state);
        assert_eq!(first.server_ids(), vec!["b", "a"]);
        assert_eq!(first.server_ids(), second.server_ids());
    }

    #[tokio::test]
    async fn repeated_connect_reaches_same_server() {
        let h = Harness::new(credentials(vec![
            saved("a", "http://a:8096", Some("ta"), 100),
            saved("b", "http://b:8096", Some("tb"), 200),
        ]));
        h.transport.online("http://a:8096", "a", "A");
        h.transport.accepts_token("http://a:8096", "a", "A");
        let manager = h.manager();

        let first = manager.connect().await;
        let second = manager.connect().await;

        assert_eq!(first.state, ConnectionState::SignedIn);
        assert_eq!(second.state, ConnectionState::SignedIn);
        assert_eq!(first.server_ids(), second.server_ids());
    }

    #[tokio::test]
    async fn logout_clears_and_persists_before_reconnecting() {
        let h = Harness::new(credentials(vec![saved("s1", LOCAL, Some("tok"), 10)]));
        h.transport.online(LOCAL, "s1", "Den");
        h.transport.accepts_token(LOCAL, "s1", "Den");
        h.transport.respond(&logout_url(LOCAL), "");
        let manager = h.manager();
        let events = manager.events();
        assert_eq!(manager.connect().await.state, ConnectionState::SignedIn);
        let saves_before = h.store.save_count();

        let outcome = manager.logout().await;

        assert_ne!(outcome.state, ConnectionState::SignedIn);
        assert_eq!(outcome.state, ConnectionState::ServerSignIn);
        assert!(h.store.save_count() > saves_before);
        assert!(h.store.load().servers.iter().all(|s| !s.has_access_token()));
        assert!(!manager.client("s1").unwrap().is_authenticated());

        let journal = h.journal();
        let logout_at = journal
            .iter()
            .position(|e| *e == format!("POST {}", logout_url(LOCAL)))
            .unwrap();
        let last_probe = journal
            .iter()
            .rposition(|e| *e == format!("GET {}", public_info_url(LOCAL)))
            .unwrap();
        assert!(logout_at < last_probe);

        let events = drain(&events);
        assert!(matches!(events[0], ConnectionEvent::SignedIn { .. }));
        assert_eq!(events[1], ConnectionEvent::LoggedOut);
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn logout_survives_failed_server_logout() {
        let h = Harness::new(credentials(vec![saved("s1", LOCAL, Some("tok"), 10)]));
        h.transport.online(LOCAL, "s1", "Den");
        h.transport.accepts_token(LOCAL, "s1", "Den");
        let manager = h.manager();
        manager.connect().await;

        let outcome = manager.logout().await;

        assert_eq!(h.transport.request_count(&logout_url(LOCAL)), 1);
        assert_eq!(outcome.state, ConnectionState::ServerSignIn);
        assert!(!h.store.load().server("s1").unwrap().has_access_token());
    }

    #[tokio::test]
    async fn logout_without_any_session_still_resolves() {
        let h = Harness::new(ServerCredentials::default());
        let outcome = h.manager().logout().await;
        assert_eq!(outcome.state, ConnectionState::ServerSelection);
        assert!(h.transport.urls().is_empty());
    }

    #[tokio::test]
    async fn sign_in_is_recorded_and_reused() {
        let h = Harness::new(credentials(vec![saved("s1", LOCAL, None, 10)]));
        h.transport.online(LOCAL, "s1", "Den");
        h.transport.accepts_token(LOCAL, "s1", "Den");
        let manager = h.manager();
        let events = manager.events();
        assert_eq!(manager.connect().await.state, ConnectionState::ServerSignIn);

        let client = manager
            .on_authenticated("s1", &auth_result("fresh"), true)
            .unwrap();

        assert_eq!(client.access_token().as_deref(), Some("fresh"));
        assert_eq!(client.address(), LOCAL);
        let stored = h.store.load();
        assert_eq!(stored.server("s1").unwrap().access_token(), Some("fresh"));
        assert_eq!(stored.server("s1").unwrap().user_id.as_deref(), Some("u2"));
        assert_eq!(
            drain(&events),
            vec![ConnectionEvent::SignedIn {
                server_id: "s1".into(),
                user_id: Some("u2".into()),
                mode: Some(ConnectionMode::Local),
            }]
        );

        assert_eq!(manager.connect().await.state, ConnectionState::SignedIn);
    }

    #[tokio::test]
    async fn unsaved_sign_in_only_reaches_the_handle() {
        let h = Harness::new(credentials(vec![saved("s1", LOCAL, Some("old"), 10)]));
        let manager = h.manager();

        let client = manager
            .on_authenticated("s1", &auth_result("session-only"), false)
            .unwrap();

        assert_eq!(client.access_token().as_deref(), Some("session-only"));
        assert!(!h.store.load().server("s1").unwrap().has_access_token());
    }

    #[test]
    fn sign_in_for_unknown_server_is_rejected() {
        let h = Harness::new(ServerCredentials::default());
        assert!(matches!(
            h.manager().on_authenticated("nope", &auth_result("t"), true),
            Err(ConnectError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn wake_all_covers_every_saved_target() {
        let mut a = saved("a", "http://a:8096", None, 1);
        a.wake_targets = vec![
            WakeTarget {
                mac_address: "AA:AA:AA:AA:AA:AA".into(),
                port: 9,
            },
            WakeTarget {
                mac_address: "BB:BB:BB:BB:BB:BB".into(),
                port: 9,
            },
        ];
        let mut b = saved("b", "http://b:8096", None, 2);
        b.wake_targets = vec![WakeTarget {
            mac_address: "CC:CC:CC:CC:CC:CC".into(),
            port: 7,
        }];
        let h = Harness::new(credentials(vec![a, b, saved("c", "http://c:8096", None, 3)]));
        h.network.fail_mac("CC:CC:CC:CC:CC:CC");

        let report = h.manager().wake_all_servers().await;

        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(h.network.wakes().len(), 3);
    }

    #[tokio::test]
    async fn typed_address_goes_through_manager() {
        let h = Harness::new(ServerCredentials::default());
        h.transport.online("http://nas:8096", "s9", "Nas");
        let manager = h.manager();

        let outcome = manager.connect_address("nas:8096").await.unwrap();

        assert_eq!(outcome.state, ConnectionState::ServerSignIn);
        assert!(manager.client("s9").is_some());
        assert_eq!(manager.saved_servers()[0].id, "s9");
    }
}
