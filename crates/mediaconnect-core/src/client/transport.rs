use crate::error::ConnectError;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Header carrying a per-server access token.
pub const ACCESS_TOKEN_HEADER: &str = "X-Emby-Token";
/// Header describing the client application and device.
pub const AUTHORIZATION_HEADER: &str = "X-Emby-Authorization";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single HTTP request handed to the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    /// `None` means the transport default applies
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Issues HTTP requests and returns the response body.
///
/// Non-success statuses are reported as `ConnectError::HttpStatus`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<String, ConnectError>;
}

/// `Transport` backed by a shared `reqwest::Client`.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<String, ConnectError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ConnectError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ConnectError::HttpStatus {
                url: request.url,
                status: resp.status().as_u16(),
            });
        }

        resp.text()
            .await
            .map_err(|e| ConnectError::Transport(format!("failed to read body: {}", e)))
    }
}

/// Decode a JSON response body.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ConnectError> {
    Ok(serde_json::from_str(body)?)
}

fn join(address: &str, path: &str) -> String {
    format!("{}{}", address.trim_end_matches('/'), path)
}

/// Unauthenticated probe endpoint.
pub fn public_info_url(address: &str) -> String {
    join(address, "/system/info/public?format=json")
}

/// Authenticated info endpoint used to validate a token.
pub fn system_info_url(address: &str) -> String {
    join(address, "/system/info?format=json")
}

pub fn logout_url(address: &str) -> String {
    join(address, "/Sessions/Logout")
}
