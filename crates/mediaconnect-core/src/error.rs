use thiserror::Error;

/// Errors produced by the connection engine and its collaborators.
///
/// Only `InvalidArgument` ever escapes a resolution cycle. Everything else is
/// absorbed by the fallback ladder and shows up as a `ConnectionState`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// Malformed caller input (e.g. an empty address)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Network error or timeout on a single request
    #[error("transport failure: {0}")]
    Transport(String),
    /// The server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },
    /// Response body did not have the expected shape
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// Stored access token was rejected
    #[error("access token rejected")]
    AuthInvalid,
    /// Credential store could not be written
    #[error("failed to persist credentials: {0}")]
    Persist(String),
    /// Every candidate address was exhausted
    #[error("no server reachable")]
    NoServerReachable,
}

impl ConnectError {
    /// Whether this error is an expected, locally recovered condition.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ConnectError::InvalidArgument(_))
    }
}

impl From<serde_json::Error> for ConnectError {
    fn from(e: serde_json::Error) -> Self {
        ConnectError::Decode(e.to_string())
    }
}
