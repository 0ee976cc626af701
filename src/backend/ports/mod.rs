//! Port contracts for backend transports.

mod transport;

#[cfg(test)]
pub use transport::MockTransportSession;
pub use transport::{TransportConnector, TransportError, TransportResult, TransportSession};
