//! Sequential execution of registry skills.
//!
//! A run renders each step's argument templates against the skill inputs
//! and the results of earlier steps, then routes the call through the same
//! [`ports::ToolInvoker`] used for direct tool calls. The first failing step
//! aborts the run.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Orchestration services in [`services`]

pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
