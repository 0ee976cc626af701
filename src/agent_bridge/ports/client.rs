//! Peer protocol client contract.

use crate::agent_bridge::domain::{
    AgentCard, AgentPeer, SendMessageParams, SendMessageResult, Task,
};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for agent client operations.
pub type AgentClientResult<T> = Result<T, AgentClientError>;

/// Failures reported by agent clients.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentClientError {
    /// The agent could not be reached at all.
    #[error("agent unreachable: {0}")]
    Unreachable(String),

    /// The agent answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The call did not complete before its deadline.
    #[error("'{method}' timed out after {timeout_ms} ms")]
    Timeout {
        /// Peer method or resource that timed out.
        method: String,
        /// Deadline in milliseconds.
        timeout_ms: u128,
    },

    /// The agent answered with a JSON-RPC error.
    #[error("agent error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// The agent answered with something that is not a valid result.
    #[error("malformed agent response: {0}")]
    Protocol(String),
}

impl AgentClientError {
    /// Returns whether the failure means the agent is not reachable.
    #[must_use]
    pub const fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    /// Creates a timeout error for `method`.
    #[must_use]
    pub fn timeout(method: &str, timeout: Duration) -> Self {
        Self::Timeout {
            method: method.to_owned(),
            timeout_ms: timeout.as_millis(),
        }
    }
}

/// Speaks the agent peer protocol.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Fetches the capability card served at the peer's endpoint.
    async fn fetch_card(&self, peer: &AgentPeer, timeout: Duration)
    -> AgentClientResult<AgentCard>;

    /// Sends `message/send` to the peer's message URL.
    async fn send_message(
        &self,
        peer: &AgentPeer,
        params: SendMessageParams,
        timeout: Duration,
    ) -> AgentClientResult<SendMessageResult>;

    /// Fetches the current state of a task with `tasks/get`.
    async fn get_task(
        &self,
        peer: &AgentPeer,
        task_id: &str,
        timeout: Duration,
    ) -> AgentClientResult<Task>;
}
