use crate::api::SystemInfo;
use crate::client::transport::{
    decode, system_info_url, HttpRequest, Transport, ACCESS_TOKEN_HEADER, AUTHORIZATION_HEADER,
};
use crate::error::ConnectError;
use crate::types::ServerDescriptor;

use std::sync::Arc;

/// Result of validating a stored access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    /// The server accepted the token
    Valid,
    /// The token was rejected (or the check failed) and has been dropped
    Cleared,
    /// There was no token to validate
    Missing,
}

/// Checks a stored access token against a reachable server.
pub struct AuthValidator {
    transport: Arc<dyn Transport>,
    authorization: String,
}

impl AuthValidator {
    pub fn new(transport: Arc<dyn Transport>, authorization: String) -> Self {
        Self {
            transport,
            authorization,
        }
    }

    /// Validate `server`'s token against `address`.
    ///
    /// On success the server metadata is refreshed from the response. On any
    /// failure the token and user id are cleared. Never returns an error.
    pub async fn validate(&self, server: &mut ServerDescriptor, address: &str) -> AuthStatus {
        let Some(token) = server.access_token().map(str::to_string) else {
            return AuthStatus::Missing;
        };

        match self.fetch_system_info(address, token).await {
            Ok(info) => {
                log::debug!("Stored credentials for {} are valid", server.name);
                server.import_system_info(&info);
                AuthStatus::Valid
            }
            Err(e) => {
                log::info!(
                    "Stored credentials for {} no longer valid ({}), clearing",
                    server.name,
                    e
                );
                server.clear_auth();
                AuthStatus::Cleared
            }
        }
    }

    async fn fetch_system_info(
        &self,
        address: &str,
        token: String,
    ) -> Result<SystemInfo, ConnectError> {
        let request = HttpRequest::get(system_info_url(address))
            .header(AUTHORIZATION_HEADER, self.authorization.clone())
            .header(ACCESS_TOKEN_HEADER, token);
        let body = self.transport.send(request).await.map_err(|e| match e {
            ConnectError::HttpStatus { status: 401 | 403, .. } => ConnectError::AuthInvalid,
            other => other,
        })?;
        decode(&body)
    }
}
