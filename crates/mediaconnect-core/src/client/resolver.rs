use crate::address::normalize_address;
use crate::api::PublicSystemInfo;
use crate::client::api_client::ClientRegistry;
use crate::client::auth::{AuthStatus, AuthValidator};
use crate::client::transport::{decode, public_info_url, HttpRequest, Transport, AUTHORIZATION_HEADER};
use crate::client::types::{ConnectionEvent, ConnectionOutcome};
use crate::client::wake::WakeCoordinator;
use crate::credentials::CredentialStore;
use crate::error::ConnectError;
use crate::types::{
    now_millis, sort_by_last_accessed, ConnectionMode, ConnectionState, ServerDescriptor,
};

use std::sync::Arc;
use std::time::Duration;

/// Decides which server to use and how to reach it.
///
/// Servers are tried most recently used first, one at a time. Each server
/// goes through the same ladder: local address, wake-on-LAN plus one local
/// retry, remote address.
pub struct ConnectionResolver {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    auth: AuthValidator,
    wake: WakeCoordinator,
    clients: Arc<ClientRegistry>,
    event_tx: async_channel::Sender<ConnectionEvent>,
    authorization: String,
    probe_timeout: Duration,
}

impl ConnectionResolver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        auth: AuthValidator,
        wake: WakeCoordinator,
        clients: Arc<ClientRegistry>,
        event_tx: async_channel::Sender<ConnectionEvent>,
        authorization: String,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            store,
            auth,
            wake,
            clients,
            event_tx,
            authorization,
            probe_timeout,
        }
    }

    /// Pick a server out of `servers` and connect to it.
    pub async fn resolve(&self, mut servers: Vec<ServerDescriptor>) -> ConnectionOutcome {
        sort_by_last_accessed(&mut servers);

        match servers.len() {
            0 => {
                log::debug!("No saved servers");
                ConnectionOutcome::server_selection(servers)
            }
            1 => {
                let mut server = servers.remove(0);
                self.connect_server(&mut server).await
            }
            _ => self.resolve_multiple(servers).await,
        }
    }

    async fn resolve_multiple(&self, mut servers: Vec<ServerDescriptor>) -> ConnectionOutcome {
        log::debug!("Looping through {} saved servers", servers.len());

        for server in servers.iter_mut() {
            // Without a stored token the best possible result is ServerSignIn
            if !server.has_access_token() {
                log::debug!("Skipping {}: no saved access token", server.name);
                continue;
            }

            let outcome = self.connect_server(server).await;
            if outcome.state == ConnectionState::SignedIn {
                log::debug!("Connected to server {}", server.name);
                return outcome;
            }
            log::debug!("Trying next server");
        }

        log::debug!("No server signed in, falling back to server selection");
        // Reached servers were stamped with a fresh access time
        sort_by_last_accessed(&mut servers);
        ConnectionOutcome::server_selection(servers)
    }

    /// Run the fallback ladder for one known server.
    pub async fn connect_server(&self, server: &mut ServerDescriptor) -> ConnectionOutcome {
        if !server.has_address() {
            log::debug!("Server {} has no address", server.name);
            return ConnectionOutcome::unavailable();
        }

        if let Some(local) = server.local_address().map(str::to_string) {
            match self.probe(&local).await {
                Ok(info) => {
                    return self.on_reached(server, info, ConnectionMode::Local, &local).await;
                }
                Err(e) => log::debug!("Local address {} unreachable: {}", local, e),
            }

            if !server.wake_targets.is_empty() {
                self.wake.wake(server).await;
                match self.probe(&local).await {
                    Ok(info) => {
                        return self.on_reached(server, info, ConnectionMode::Local, &local).await;
                    }
                    Err(e) => log::debug!("Local address {} still unreachable after wake: {}", local, e),
                }
            }
        }

        if let Some(remote) = server.remote_address().map(str::to_string) {
            match self.probe(&remote).await {
                Ok(info) => {
                    return self.on_reached(server, info, ConnectionMode::Remote, &remote).await;
                }
                Err(e) => log::debug!("Remote address {} unreachable: {}", remote, e),
            }
        }

        log::debug!("No server available at any address of {}", server.name);
        ConnectionOutcome::unavailable()
    }

    /// Connect to a typed address, trying each normalized candidate in turn.
    pub async fn connect_address(&self, address: &str) -> Result<ConnectionOutcome, ConnectError> {
        for candidate in normalize_address(address)? {
            log::debug!("Attempting to connect to server at {}", candidate);
            let info = match self.probe(&candidate).await {
                Ok(info) => info,
                Err(e) => {
                    log::debug!("{} unreachable: {}", candidate, e);
                    continue;
                }
            };

            let mut server = ServerDescriptor::default();
            server.import_public_info(&info);
            if let Some(known) = self.store.load().server(&server.id) {
                seed_from_known(&mut server, known);
            }
            return Ok(self
                .on_reached(&mut server, info, ConnectionMode::Local, &candidate)
                .await);
        }

        Ok(ConnectionOutcome::unavailable())
    }

    async fn probe(&self, address: &str) -> Result<PublicSystemInfo, ConnectError> {
        let request = HttpRequest::get(public_info_url(address))
            .header(AUTHORIZATION_HEADER, self.authorization.clone())
            .timeout(self.probe_timeout);
        let body = self.transport.send(request).await?;
        decode(&body)
    }

    async fn on_reached(
        &self,
        server: &mut ServerDescriptor,
        info: PublicSystemInfo,
        mode: ConnectionMode,
        address: &str,
    ) -> ConnectionOutcome {
        if self.auth.validate(server, address).await == AuthStatus::Cleared {
            self.emit(ConnectionEvent::CredentialsCleared {
                server_id: server.id.clone(),
            });
        }

        server.import_public_info(&info);
        // The address that answered wins over whatever the server advertises
        match mode {
            ConnectionMode::Local => server.local_address = Some(address.to_string()),
            ConnectionMode::Remote => server.remote_address = Some(address.to_string()),
        }
        server.date_last_accessed = now_millis();
        if let Err(e) = self.store.update_server(server) {
            log::warn!("Failed to save credentials for {}: {}", server.name, e);
        }

        let client = self.clients.get_or_add(server, address, mode);
        let state = if server.has_access_token() {
            ConnectionState::SignedIn
        } else {
            ConnectionState::ServerSignIn
        };
        log::info!("Reached {} at {} ({:?}): {}", server.name, address, mode, state.display_name());

        if state == ConnectionState::SignedIn {
            self.emit(ConnectionEvent::SignedIn {
                server_id: server.id.clone(),
                user_id: server.user_id.clone(),
                mode: Some(mode),
            });
        }

        ConnectionOutcome::reached(state, server.clone(), client, mode)
    }

    fn emit(&self, event: ConnectionEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            log::debug!("Dropping connection event: {}", e);
        }
    }
}

/// Carry over what the store knows about a server reached by typed address.
fn seed_from_known(server: &mut ServerDescriptor, known: &ServerDescriptor) {
    if !server.has_access_token() {
        server.access_token = known.access_token.clone();
        server.user_id = known.user_id.clone();
    }
    if server.remote_address().is_none() {
        server.remote_address = known.remote_address.clone();
    }
    if server.wake_targets.is_empty() {
        server.wake_targets = known.wake_targets.clone();
    }
    server.exchange_token = server.exchange_token.take().or_else(|| known.exchange_token.clone());
}
