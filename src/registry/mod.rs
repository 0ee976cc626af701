//! Prompt templates and multi-step skill definitions.
//!
//! Items are loaded as drafts and become visible only once activated.
//! Activating a skill checks every step against the current catalog, so a
//! broken definition is rejected before it can be invoked. Active skills are
//! published as tools of the reserved `registry` provider.
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
