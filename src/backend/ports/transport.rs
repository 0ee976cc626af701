//! Uniform client contract over heterogeneous backend connections.

use crate::backend::domain::TransportConfig;
use crate::catalog::domain::{ProviderName, ToolDefinition, ToolOutput};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Failures reported by transports.
///
/// Connection-level failures mean the backend is unreachable and the session
/// is unusable; call-level failures leave the session intact.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The backend could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The connection dropped while the session was in use.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The initialization handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The call did not complete before its deadline.
    #[error("'{method}' timed out after {timeout_ms} ms")]
    Timeout {
        /// JSON-RPC method that timed out.
        method: String,
        /// Deadline in milliseconds.
        timeout_ms: u128,
    },

    /// The backend answered with a JSON-RPC error.
    #[error("backend error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// The backend answered with something that is not a valid result.
    #[error("malformed backend response: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Returns whether the failure concerns the connection rather than the
    /// individual call.
    #[must_use]
    pub const fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::Unreachable(_) | Self::ConnectionClosed(_) | Self::Handshake(_)
        )
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

/// An open, initialized connection to one backend.
///
/// Sessions correlate concurrent calls by request identifier, so callers may
/// share one session freely.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransportSession: Send + Sync {
    /// Lists the tools the backend advertises.
    async fn list_tools(&self, timeout: Duration) -> TransportResult<Vec<ToolDefinition>>;

    /// Invokes a provider-local tool.
    async fn invoke(
        &self,
        tool: &str,
        arguments: Value,
        timeout: Duration,
    ) -> TransportResult<ToolOutput>;

    /// Checks liveness.
    async fn ping(&self, timeout: Duration) -> TransportResult<()>;

    /// Closes the connection and releases owned resources.
    async fn close(&self);
}

/// Opens sessions, completing the initialization handshake before returning.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Connects to `backend` and performs the handshake.
    async fn connect(
        &self,
        backend: &ProviderName,
        transport: &TransportConfig,
    ) -> TransportResult<Arc<dyn TransportSession>>;
}
