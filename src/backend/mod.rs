//! Tool backends: transports, connection state and the backend registry.
//!
//! A backend is a process or service speaking line- or HTTP-framed JSON-RPC.
//! The registry owns one transport session per backend, tracks its
//! connection state, applies the server-level tool filter and keeps the
//! catalog in step with every state change.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
