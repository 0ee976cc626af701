//! Domain model for backend declarations, transports and connection state.

mod declaration;
mod error;
mod health;
mod state;
mod transport;

pub use declaration::BackendDeclaration;
pub use error::{BackendDomainError, ParseBackendStateError};
pub use health::{HealthSnapshot, HealthStatus};
pub use state::BackendState;
pub use transport::{
    EventStreamTransportConfig, HttpTransportConfig, LocalProcessConfig, RemoteShellConfig,
    TransportConfig, TransportKind,
};
