//! Namespaced tool catalog shared by every provider.
//!
//! Backends, agent peers and the skill registry all contribute tools to one
//! catalog. Each contribution is keyed by its provider name, and every tool is
//! exposed externally as `provider__tool`. Readers always observe a complete
//! immutable snapshot; writers publish a fresh snapshot in a single step.
//!
//! - Domain types in [`domain`]
//! - The snapshot publisher in [`services`]

pub mod domain;
pub mod services;
