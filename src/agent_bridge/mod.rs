//! Agent-to-agent peers exposed as tool providers.
//!
//! Each agent advertises its skills in a capability card. The bridge
//! publishes those skills into the catalog as `agent__skill` tools and
//! forwards invocations using the peer protocol's own message and task
//! calls. Remote agents stay out of the catalog until their card has been
//! fetched, and drop out again whenever they stop answering.
//!
//! The gateway can also serve agents of its own over the same protocol; see
//! [`services::AgentHost`].
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
