use crate::client::api_client::ServerClient;
use crate::error::ConnectError;
use crate::types::{ConnectionMode, ConnectionState, ServerDescriptor};

/// Timeout for the unauthenticated public info probe (8 seconds).
pub const PROBE_TIMEOUT_MS: u64 = 8000;

/// The single result of a resolution cycle.
#[derive(Clone, Debug)]
pub struct ConnectionOutcome {
    pub state: ConnectionState,
    /// Servers relevant to the state: the reached server, or the full
    /// selection list, or nothing
    pub servers: Vec<ServerDescriptor>,
    /// Handle to the reached server, if one was reached
    pub client: Option<ServerClient>,
    /// Address field used for the reach
    pub mode: Option<ConnectionMode>,
}

impl ConnectionOutcome {
    pub fn unavailable() -> Self {
        Self {
            state: ConnectionState::Unavailable,
            servers: Vec::new(),
            client: None,
            mode: None,
        }
    }

    pub fn server_selection(servers: Vec<ServerDescriptor>) -> Self {
        Self {
            state: ConnectionState::ServerSelection,
            servers,
            client: None,
            mode: None,
        }
    }

    pub(crate) fn reached(
        state: ConnectionState,
        server: ServerDescriptor,
        client: ServerClient,
        mode: ConnectionMode,
    ) -> Self {
        Self {
            state,
            servers: vec![server],
            client: Some(client),
            mode: Some(mode),
        }
    }

    /// The first server of the outcome (the reached one, when any).
    pub fn server(&self) -> Option<&ServerDescriptor> {
        self.servers.first()
    }

    pub fn server_ids(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.id.as_str()).collect()
    }

    /// Turn an `Unavailable` outcome into `ConnectError::NoServerReachable`.
    pub fn into_result(self) -> Result<Self, ConnectError> {
        match self.state {
            ConnectionState::Unavailable => Err(ConnectError::NoServerReachable),
            _ => Ok(self),
        }
    }
}

/// Events emitted by the connection manager on its event channel.
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionEvent {
    /// A server was reached with a valid credential, or a sign-in was recorded
    SignedIn {
        server_id: String,
        user_id: Option<String>,
        mode: Option<ConnectionMode>,
    },
    /// A stored credential was rejected and dropped
    CredentialsCleared { server_id: String },
    /// All server credentials were cleared by logout
    LoggedOut,
}
