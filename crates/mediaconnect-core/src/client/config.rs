use crate::client::types::PROBE_TIMEOUT_MS;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default cloud registry endpoint.
pub const DEFAULT_REGISTRY_URL: &str = "https://connect.emby.media";
/// UDP port servers listen on for discovery broadcasts.
pub const DEFAULT_DISCOVERY_PORT: u16 = 7359;

/// Identity of this client and tunables for the connection engine.
/// Persisted in settings.json.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Application name reported to servers
    pub app_name: String,
    pub app_version: String,
    /// Stable per-install identifier
    pub device_id: String,
    /// Human-readable device label (e.g. the hostname)
    pub device_name: String,
    /// How long a public info probe may take before the address counts as down
    pub probe_timeout_ms: u64,
    /// Base URL of the cloud registry
    pub registry_url: String,
    /// How long to collect replies to a discovery broadcast
    pub discovery_timeout_ms: u64,
    pub discovery_port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_name: "mediaconnect".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            device_id: String::new(),
            device_name: "unknown".to_string(),
            probe_timeout_ms: PROBE_TIMEOUT_MS,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            discovery_timeout_ms: 1500,
            discovery_port: DEFAULT_DISCOVERY_PORT,
        }
    }
}

impl ClientConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    /// Value of the client authorization header sent with every request.
    pub fn authorization_header(&self) -> String {
        format!(
            "MediaBrowser Client=\"{}\", Device=\"{}\", DeviceId=\"{}\", Version=\"{}\"",
            self.app_name, self.device_name, self.device_id, self.app_version
        )
    }
}
