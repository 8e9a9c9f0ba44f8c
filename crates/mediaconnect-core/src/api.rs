use serde::{Deserialize, Serialize};

// ── API request/response types ──────────────────────────────────────────────

/// GET /system/info/public response
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PublicSystemInfo {
    pub id: String,
    pub server_name: String,
    pub version: Option<String>,
    pub local_address: Option<String>,
    pub wan_address: Option<String>,
}

/// GET /system/info response (authenticated)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SystemInfo {
    pub id: String,
    pub server_name: String,
    pub version: Option<String>,
    pub local_address: Option<String>,
    pub wan_address: Option<String>,
    pub operating_system: Option<String>,
    pub has_pending_restart: bool,
}

/// One reply to the local-network discovery broadcast
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiscoveryInfo {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub name: String,
}

/// One entry of the cloud registry server list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistryServer {
    pub system_id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub local_address: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub access_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserDto {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Result of a sign-in performed against a server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticationResult {
    pub access_token: String,
    pub user: UserDto,
    #[serde(default)]
    pub server_id: Option<String>,
}
