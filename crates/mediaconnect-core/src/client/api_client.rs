use crate::client::transport::{
    logout_url, HttpRequest, Transport, ACCESS_TOKEN_HEADER, AUTHORIZATION_HEADER,
};
use crate::error::ConnectError;
use crate::types::{ConnectionMode, ServerDescriptor};

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Handle to a reached server. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ServerClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    server_id: String,
    transport: Arc<dyn Transport>,
    authorization: String,
    state: RwLock<ClientState>,
}

struct ClientState {
    address: String,
    mode: ConnectionMode,
    access_token: Option<String>,
    user_id: Option<String>,
}

impl ServerClient {
    fn new(
        server_id: String,
        address: String,
        mode: ConnectionMode,
        transport: Arc<dyn Transport>,
        authorization: String,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                server_id,
                transport,
                authorization,
                state: RwLock::new(ClientState {
                    address,
                    mode,
                    access_token: None,
                    user_id: None,
                }),
            }),
        }
    }

    pub fn server_id(&self) -> &str {
        &self.inner.server_id
    }

    /// Base address later requests should target.
    pub fn address(&self) -> String {
        self.inner.state.read().address.clone()
    }

    pub fn mode(&self) -> ConnectionMode {
        self.inner.state.read().mode
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.state.read().access_token.clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.state.read().user_id.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .state
            .read()
            .access_token
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    pub fn set_authentication_info(&self, access_token: &str, user_id: Option<&str>) {
        let mut state = self.inner.state.write();
        state.access_token = Some(access_token.to_string());
        state.user_id = user_id.map(str::to_string);
    }

    pub fn clear_authentication_info(&self) {
        let mut state = self.inner.state.write();
        state.access_token = None;
        state.user_id = None;
    }

    fn set_endpoint(&self, address: &str, mode: ConnectionMode) {
        let mut state = self.inner.state.write();
        state.address = address.to_string();
        state.mode = mode;
    }

    /// End the server-side session, then forget the local credential.
    /// The credential is dropped even when the request fails.
    pub async fn logout(&self) -> Result<(), ConnectError> {
        let (address, token) = {
            let state = self.inner.state.read();
            (state.address.clone(), state.access_token.clone())
        };
        let Some(token) = token else {
            return Ok(());
        };

        let request = HttpRequest::post(logout_url(&address))
            .header(AUTHORIZATION_HEADER, self.inner.authorization.clone())
            .header(ACCESS_TOKEN_HEADER, token);
        let result = self.inner.transport.send(request).await.map(|_| ());
        self.clear_authentication_info();
        result
    }
}

impl fmt::Debug for ServerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("ServerClient")
            .field("server_id", &self.inner.server_id)
            .field("address", &state.address)
            .field("mode", &state.mode)
            .field("authenticated", &state.access_token.is_some())
            .finish()
    }
}

/// Live client handles keyed by server id.
///
/// A handle is inserted the first time a server is reached. Every later
/// reach refreshes its endpoint and credential from the descriptor.
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, ServerClient>>,
    transport: Arc<dyn Transport>,
    authorization: String,
}

impl ClientRegistry {
    pub fn new(transport: Arc<dyn Transport>, authorization: String) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            transport,
            authorization,
        }
    }

    pub fn get(&self, server_id: &str) -> Option<ServerClient> {
        self.clients.read().get(server_id).cloned()
    }

    pub fn all(&self) -> Vec<ServerClient> {
        self.clients.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Get or create the handle for `server`, pointed at `address`.
    pub fn get_or_add(
        &self,
        server: &ServerDescriptor,
        address: &str,
        mode: ConnectionMode,
    ) -> ServerClient {
        let key = if server.id.is_empty() {
            address.to_string()
        } else {
            server.id.clone()
        };

        let client = self
            .clients
            .write()
            .entry(key.clone())
            .or_insert_with(|| {
                log::debug!("Creating client for server {} at {}", key, address);
                ServerClient::new(
                    key,
                    address.to_string(),
                    mode,
                    self.transport.clone(),
                    self.authorization.clone(),
                )
            })
            .clone();

        client.set_endpoint(address, mode);
        match server.access_token() {
            Some(token) => client.set_authentication_info(token, server.user_id.as_deref()),
            None => client.clear_authentication_info(),
        }
        client
    }
}
