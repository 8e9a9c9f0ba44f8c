pub mod api_client;
pub mod auth;
pub mod config;
pub mod discovery;
pub mod manager;
pub mod network;
pub mod registry;
pub mod resolver;
pub mod transport;
pub mod types;
pub mod wake;

#[cfg(test)]
pub(crate) mod testing;

pub use api_client::{ClientRegistry, ServerClient};
pub use auth::{AuthStatus, AuthValidator};
pub use config::ClientConfig;
pub use discovery::DiscoveryAggregator;
pub use manager::{Collaborators, ConnectionManager};
pub use network::{LocalDiscoverySource, NetworkCapability, UdpNetwork, UdpServerLocator};
pub use registry::{CloudRegistrySource, HttpRegistrySource};
pub use resolver::ConnectionResolver;
pub use transport::{HttpRequest, Method, ReqwestTransport, Transport};
pub use types::{ConnectionEvent, ConnectionOutcome, PROBE_TIMEOUT_MS};
pub use wake::{WakeCoordinator, WakeReport};
