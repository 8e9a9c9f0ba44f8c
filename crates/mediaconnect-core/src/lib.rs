pub mod address;
pub mod api;
pub mod credentials;
pub mod error;
pub mod types;

#[cfg(feature = "client")]
pub mod client;

pub use address::normalize_address;
pub use credentials::{CredentialStore, MemoryCredentialStore, ServerCredentials};
pub use error::ConnectError;
pub use types::{ConnectionMode, ConnectionState, ServerDescriptor, WakeTarget};
