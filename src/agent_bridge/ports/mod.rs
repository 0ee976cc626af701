//! Port contracts for talking to agent peers and hosting local agents.

mod client;
mod handler;
mod task_store;

#[cfg(test)]
pub use client::MockAgentClient;
pub use client::{AgentClient, AgentClientError, AgentClientResult};
pub use handler::TaskHandler;
#[cfg(test)]
pub use task_store::MockTaskStore;
pub use task_store::{TaskStore, TaskStoreError, TaskStoreResult};
