use crate::api::{PublicSystemInfo, SystemInfo};
use serde::{Deserialize, Serialize};

/// A MAC address / UDP port pair that can receive a wake-on-LAN packet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeTarget {
    pub mac_address: String,
    #[serde(default = "default_wake_port")]
    pub port: u16,
}

fn default_wake_port() -> u16 {
    9
}

/// Which address field of a server was used for a successful reach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    Local,
    Remote,
}

/// Terminal state of one resolution cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No reachable server at all
    Unavailable,
    /// Servers are known but none is a confirmed working choice
    ServerSelection,
    /// A server was reached but has no valid credential
    ServerSignIn,
    /// A server was reached and the stored credential is good
    SignedIn,
}

impl ConnectionState {
    pub fn display_name(self) -> &'static str {
        match self {
            ConnectionState::Unavailable => "Unavailable",
            ConnectionState::ServerSelection => "Server selection",
            ConnectionState::ServerSignIn => "Sign-in required",
            ConnectionState::SignedIn => "Signed in",
        }
    }
}

/// A known server: identity, addresses, credential and wake metadata.
/// Persisted in credentials.json as part of `servers`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Server system id, stable across restarts of the server
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Address on the local network (e.g. "http://10.0.0.5:8096")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_address: Option<String>,
    /// Public/WAN address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Access key handed out by the cloud registry for this server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_token: Option<String>,
    /// Unix timestamp in milliseconds, 0 if never accessed
    #[serde(default)]
    pub date_last_accessed: i64,
    #[serde(default)]
    pub wake_targets: Vec<WakeTarget>,
}

impl ServerDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn local_address(&self) -> Option<&str> {
        non_empty(&self.local_address)
    }

    pub fn remote_address(&self) -> Option<&str> {
        non_empty(&self.remote_address)
    }

    pub fn access_token(&self) -> Option<&str> {
        non_empty(&self.access_token)
    }

    pub fn has_address(&self) -> bool {
        self.local_address().is_some() || self.remote_address().is_some()
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token().is_some()
    }

    /// Address used for the given mode, if the descriptor has one.
    pub fn address_for(&self, mode: ConnectionMode) -> Option<&str> {
        match mode {
            ConnectionMode::Local => self.local_address(),
            ConnectionMode::Remote => self.remote_address(),
        }
    }

    pub fn set_auth(&mut self, access_token: impl Into<String>, user_id: impl Into<String>) {
        self.access_token = Some(access_token.into());
        self.user_id = Some(user_id.into());
    }

    pub fn clear_auth(&mut self) {
        self.access_token = None;
        self.user_id = None;
    }

    /// Refresh identity and addresses from a public info probe.
    pub fn import_public_info(&mut self, info: &PublicSystemInfo) {
        self.import(
            &info.id,
            &info.server_name,
            info.local_address.as_deref(),
            info.wan_address.as_deref(),
        );
    }

    /// Refresh identity and addresses from an authenticated info response.
    pub fn import_system_info(&mut self, info: &SystemInfo) {
        self.import(
            &info.id,
            &info.server_name,
            info.local_address.as_deref(),
            info.wan_address.as_deref(),
        );
    }

    fn import(&mut self, id: &str, name: &str, local: Option<&str>, wan: Option<&str>) {
        if !name.is_empty() {
            self.name = name.to_string();
        }
        if !id.is_empty() {
            self.id = id.to_string();
        }
        if let Some(local) = local.filter(|a| !a.is_empty()) {
            self.local_address = Some(local.to_string());
        }
        if let Some(wan) = wan.filter(|a| !a.is_empty()) {
            self.remote_address = Some(wan.to_string());
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Current wall-clock time as Unix milliseconds.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Sort descriptors most recently used first. Stable: ties keep their order.
pub fn sort_by_last_accessed(servers: &mut [ServerDescriptor]) {
    servers.sort_by(|a, b| b.date_last_accessed.cmp(&a.date_last_accessed));
}
