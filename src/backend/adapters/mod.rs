//! Adapter implementations for the transport ports.

mod connector;
mod correlation;
mod event_stream;
mod http;
mod memory;
mod rpc;
mod sse;
mod stdio;

pub use connector::NetworkTransportConnector;
pub use memory::{InMemoryTransport, ToolHandler};
