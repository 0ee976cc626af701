//! Unified front door over backends, agents and the skill registry.
//!
//! [`services::Gateway`] resolves namespaced tool names against the caller's
//! catalog view and routes each call to the owning provider: backend tools
//! through the backend registry, agent skills through the agent bridge and
//! registry skills through the skill executor. The executor calls back into
//! the same routing path for every step, so access policies apply per step.
//!
//! - Protocol payloads and the status aggregate in [`domain`]
//! - Routing and the JSON-RPC method table in [`services`]
//! - The HTTP surface in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;
