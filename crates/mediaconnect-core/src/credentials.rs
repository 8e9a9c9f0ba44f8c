use crate::types::ServerDescriptor;

use anyhow::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Everything the client remembers between runs: known servers plus the
/// cloud registry session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCredentials {
    /// Known servers in insertion order, unique by `id`
    #[serde(default)]
    pub servers: Vec<ServerDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_user_id: Option<String>,
}

impl ServerCredentials {
    pub fn server(&self, id: &str) -> Option<&ServerDescriptor> {
        self.servers.iter().find(|s| s.id == id)
    }

    /// Registry session as (user id, token), if both halves are present.
    pub fn registry_session(&self) -> Option<(&str, &str)> {
        let user = self.registry_user_id.as_deref().filter(|v| !v.is_empty())?;
        let token = self.registry_access_token.as_deref().filter(|v| !v.is_empty())?;
        Some((user, token))
    }

    /// Merge a discovered server: add it if the id is new, otherwise copy over
    /// the fields it carries. Never removes anything and never clears a stored
    /// credential.
    pub fn add_or_update_server(&mut self, server: ServerDescriptor) {
        self.merge(server, false);
    }

    /// Write back a server after a connection attempt. Same as
    /// `add_or_update_server` except the token and user id replace the stored
    /// ones, so a credential cleared by validation stays cleared.
    pub fn update_server(&mut self, server: ServerDescriptor) {
        self.merge(server, true);
    }

    /// Forget the access token and user of every known server.
    pub fn clear_all_auth(&mut self) {
        for server in &mut self.servers {
            server.clear_auth();
        }
    }

    fn merge(&mut self, server: ServerDescriptor, auth_is_authoritative: bool) {
        if server.id.is_empty() {
            log::debug!("Ignoring server without id ({})", server.name);
            return;
        }

        let Some(existing) = self.servers.iter_mut().find(|s| s.id == server.id) else {
            self.servers.push(server);
            return;
        };

        if !server.name.is_empty() {
            existing.name = server.name;
        }
        if let Some(local) = server.local_address.filter(|a| !a.is_empty()) {
            existing.local_address = Some(local);
        }
        if let Some(remote) = server.remote_address.filter(|a| !a.is_empty()) {
            existing.remote_address = Some(remote);
        }
        if let Some(exchange) = server.exchange_token.filter(|t| !t.is_empty()) {
            existing.exchange_token = Some(exchange);
        }
        if auth_is_authoritative || server.access_token.as_deref().is_some_and(|t| !t.is_empty()) {
            existing.access_token = server.access_token;
            existing.user_id = server.user_id;
        }
        existing.date_last_accessed = existing.date_last_accessed.max(server.date_last_accessed);
        if !server.wake_targets.is_empty() {
            existing.wake_targets = server.wake_targets;
        }
    }
}

/// Persistent storage for `ServerCredentials`.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> ServerCredentials;

    fn save(&self, credentials: &ServerCredentials) -> Result<()>;

    /// Load, apply `ServerCredentials::update_server`, save.
    ///
    /// Implementations backed by shared storage should override this to hold
    /// their lock across the read-modify-write.
    fn update_server(&self, server: &ServerDescriptor) -> Result<()> {
        let mut credentials = self.load();
        credentials.update_server(server.clone());
        self.save(&credentials)
    }
}

/// In-process store, used by tests and by callers that do not persist.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<ServerCredentials>,
    saves: Mutex<usize>,
}

impl MemoryCredentialStore {
    pub fn new(credentials: ServerCredentials) -> Self {
        Self {
            inner: Mutex::new(credentials),
            saves: Mutex::new(0),
        }
    }

    /// Number of times the store has been written.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> ServerCredentials {
        self.inner.lock().clone()
    }

    fn save(&self, credentials: &ServerCredentials) -> Result<()> {
        *self.inner.lock() = credentials.clone();
        *self.saves.lock() += 1;
        Ok(())
    }

    fn update_server(&self, server: &ServerDescriptor) -> Result<()> {
        let mut guard = self.inner.lock();
        guard.update_server(server.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}
