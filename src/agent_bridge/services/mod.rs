//! Services coordinating agent peers with the catalog.

mod bridge;
mod host;

pub use bridge::{AgentBridge, AgentError, AgentResult, AgentStatus};
pub use host::{
    ACKNOWLEDGEMENT, AgentHost, HostedAgentSummary, TASK_NOT_CANCELLABLE, TASK_NOT_FOUND,
};
