use crate::api::RegistryServer;
use crate::client::config::ClientConfig;
use crate::client::transport::{decode, HttpRequest, Transport};
use crate::error::ConnectError;
use crate::types::ServerDescriptor;

use async_trait::async_trait;
use std::sync::Arc;

const REGISTRY_TOKEN_HEADER: &str = "X-Connect-UserToken";
const APPLICATION_HEADER: &str = "X-Application";

/// Cloud service listing the servers linked to a registry account.
#[async_trait]
pub trait CloudRegistrySource: Send + Sync {
    async fn list_servers(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<Vec<RegistryServer>, ConnectError>;
}

/// Registry client speaking `GET {base}/service/servers?userId=…`.
pub struct HttpRegistrySource {
    transport: Arc<dyn Transport>,
    base_url: String,
    application: String,
}

impl HttpRegistrySource {
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self {
            transport,
            base_url: config.registry_url.trim_end_matches('/').to_string(),
            application: format!("{}/{}", config.app_name, config.app_version),
        }
    }

    fn servers_url(&self, user_id: &str) -> Result<String, ConnectError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/service/servers", self.base_url),
            &[("userId", user_id)],
        )
        .map_err(|e| ConnectError::InvalidArgument(format!("bad registry url: {}", e)))?;
        Ok(url.into())
    }
}

#[async_trait]
impl CloudRegistrySource for HttpRegistrySource {
    async fn list_servers(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<Vec<RegistryServer>, ConnectError> {
        let request = HttpRequest::get(self.servers_url(user_id)?)
            .header(REGISTRY_TOKEN_HEADER, access_token)
            .header(APPLICATION_HEADER, self.application.clone());

        let body = self.transport.send(request).await?;
        decode(&body)
    }
}

/// Convert a registry entry into a descriptor for merging.
pub fn descriptor_from_registry(server: RegistryServer) -> ServerDescriptor {
    ServerDescriptor {
        id: server.system_id,
        name: server.name,
        local_address: server.local_address,
        remote_address: server.url,
        exchange_token: server.access_key,
        ..Default::default()
    }
}
