//! Gateway-level error taxonomy.
//!
//! Every component error is folded into [`GatewayError`] before it reaches a
//! caller, so the protocol surface reports one of a small, stable set of
//! failure kinds with a matching JSON-RPC code.

use crate::agent_bridge::services::AgentError;
use crate::backend::services::BackendError;
use crate::catalog::domain::{CatalogLookupError, NamespacedToolName};
use crate::catalog::services::CatalogError;
use crate::jsonrpc::{INTERNAL_ERROR, INVALID_PARAMS, JsonRpcError};
use crate::registry::ports::StoreError;
use crate::registry::services::RegistryError;
use crate::workflow::domain::WorkflowError;
use serde_json::{Value, json};
use thiserror::Error;

/// JSON-RPC code for a provider that cannot be reached.
pub const BACKEND_UNAVAILABLE: i64 = -32001;
/// JSON-RPC code for a reachable provider whose call failed.
pub const INVOCATION_FAILED: i64 = -32002;
/// JSON-RPC code for a tool hidden by the caller's access policy.
pub const ACCESS_DENIED: i64 = -32003;
/// JSON-RPC code for an unknown tool, prompt, skill or provider.
pub const NOT_FOUND: i64 = -32004;
/// JSON-RPC code for a conflicting lifecycle transition.
pub const LIFECYCLE_CONFLICT: i64 = -32005;

/// Errors reported by the gateway surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// A definition, filter or argument template is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The provider cannot be reached.
    #[error("'{provider}' is unavailable: {reason}")]
    BackendUnavailable {
        /// Backend or agent name.
        provider: String,
        /// Connection failure or current state.
        reason: String,
    },

    /// The provider was reached but the call failed or timed out.
    #[error("'{provider}__{tool}' failed: {reason}")]
    Invocation {
        /// Backend, agent or registry name.
        provider: String,
        /// Provider-local tool name.
        tool: String,
        /// One-based skill step, when the call was part of a skill run.
        step: Option<usize>,
        /// Failure description.
        reason: String,
    },

    /// The caller's access policy hides the tool.
    #[error("caller '{caller}' may not use '{tool}'")]
    AccessDenied {
        /// Caller identity.
        caller: String,
        /// Namespaced tool name.
        tool: String,
        /// One-based skill step, when the call was part of a skill run.
        step: Option<usize>,
    },

    /// Another state change of the item is in progress.
    #[error("a state change of {kind} '{name}' is already in progress")]
    LifecycleConflict {
        /// Item kind.
        kind: String,
        /// Item name.
        name: String,
    },

    /// The named tool, item or provider does not exist or is not visible.
    #[error("{0}")]
    NotFound(String),

    /// Internal state could not be accessed.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// Returns the stable snake-case name of the failure kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::Invocation { .. } => "invocation_error",
            Self::AccessDenied { .. } => "access_denied",
            Self::LifecycleConflict { .. } => "lifecycle_conflict",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Returns the JSON-RPC error code.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Configuration(_) => INVALID_PARAMS,
            Self::BackendUnavailable { .. } => BACKEND_UNAVAILABLE,
            Self::Invocation { .. } => INVOCATION_FAILED,
            Self::AccessDenied { .. } => ACCESS_DENIED,
            Self::LifecycleConflict { .. } => LIFECYCLE_CONFLICT,
            Self::NotFound(_) => NOT_FOUND,
            Self::Internal(_) => INTERNAL_ERROR,
        }
    }

    /// Returns the structured detail attached to protocol errors.
    #[must_use]
    pub fn detail(&self) -> Value {
        match self {
            Self::BackendUnavailable { provider, .. } => {
                json!({"kind": self.kind(), "provider": provider})
            }
            Self::Invocation {
                provider,
                tool,
                step,
                ..
            } => json!({"kind": self.kind(), "provider": provider, "tool": tool, "step": step}),
            Self::AccessDenied { caller, tool, step } => {
                json!({"kind": self.kind(), "caller": caller, "tool": tool, "step": step})
            }
            Self::LifecycleConflict { kind, name } => {
                json!({"kind": self.kind(), "item_kind": kind, "name": name})
            }
            Self::Configuration(_) | Self::NotFound(_) | Self::Internal(_) => {
                json!({"kind": self.kind()})
            }
        }
    }

    /// Converts the error into a JSON-RPC error object.
    #[must_use]
    pub fn to_rpc_error(&self) -> JsonRpcError {
        JsonRpcError::new(self.code(), self.to_string()).with_data(self.detail())
    }

    /// Scopes a failed call to the one-based skill step that made it.
    ///
    /// A provider that is missing from the catalog or unreachable when the
    /// step runs is reported as an invocation failure of that step's tool.
    /// Access denials keep their kind and gain the step index.
    #[must_use]
    pub fn at_step(self, index: usize, target: &NamespacedToolName) -> Self {
        match self {
            Self::Invocation {
                provider,
                tool,
                reason,
                ..
            } => Self::Invocation {
                provider,
                tool,
                step: Some(index),
                reason,
            },
            Self::NotFound(reason) | Self::BackendUnavailable { reason, .. } => Self::Invocation {
                provider: target.provider().to_string(),
                tool: target.tool().to_owned(),
                step: Some(index),
                reason,
            },
            Self::AccessDenied { caller, tool, .. } => Self::AccessDenied {
                caller,
                tool,
                step: Some(index),
            },
            other => other,
        }
    }
}

impl From<CatalogError> for GatewayError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ProviderConflict { .. } => Self::Configuration(err.to_string()),
            CatalogError::UnknownProvider(_) => Self::NotFound(err.to_string()),
            CatalogError::Runtime(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<CatalogLookupError> for GatewayError {
    fn from(err: CatalogLookupError) -> Self {
        match err {
            CatalogLookupError::UnknownTool(_) => Self::NotFound(err.to_string()),
            CatalogLookupError::AccessDenied { caller, tool } => Self::AccessDenied {
                caller,
                tool,
                step: None,
            },
        }
    }
}

impl From<BackendError> for GatewayError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Catalog(inner) => inner.into(),
            BackendError::NotFound(_) => Self::NotFound(err.to_string()),
            BackendError::Unavailable { backend, reason } => Self::BackendUnavailable {
                provider: backend,
                reason,
            },
            BackendError::Invocation {
                backend,
                tool,
                source,
            } => Self::Invocation {
                provider: backend,
                tool,
                step: None,
                reason: source.to_string(),
            },
            BackendError::Domain(_) | BackendError::AlreadyRegistered(_) => {
                Self::Configuration(err.to_string())
            }
        }
    }
}

impl From<RegistryError> for GatewayError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Catalog(inner) => inner.into(),
            RegistryError::Store(StoreError::Runtime(_)) => Self::Internal(err.to_string()),
            RegistryError::NotFound { .. } | RegistryError::NotActive { .. } => {
                Self::NotFound(err.to_string())
            }
            RegistryError::TransitionInFlight { kind, name } => Self::LifecycleConflict {
                kind: kind.to_string(),
                name,
            },
            RegistryError::Domain(_)
            | RegistryError::Store(StoreError::InvalidDocument { .. })
            | RegistryError::UnresolvedTool { .. } => Self::Configuration(err.to_string()),
        }
    }
}

impl From<WorkflowError> for GatewayError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::StepFailed { step, tool, source } => source.at_step(step, &tool),
            WorkflowError::MissingInput { .. }
            | WorkflowError::Binding { .. }
            | WorkflowError::Definition(_) => Self::Configuration(err.to_string()),
        }
    }
}

impl From<AgentError> for GatewayError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Catalog(inner) => inner.into(),
            AgentError::NotFound(_) | AgentError::UnknownSkill { .. } => {
                Self::NotFound(err.to_string())
            }
            AgentError::Unavailable { agent, reason } => Self::BackendUnavailable {
                provider: agent,
                reason,
            },
            AgentError::Invocation {
                agent,
                skill,
                source,
            } => Self::Invocation {
                provider: agent,
                tool: skill,
                step: None,
                reason: source.to_string(),
            },
            AgentError::Domain(_) | AgentError::AlreadyRegistered(_) => {
                Self::Configuration(err.to_string())
            }
        }
    }
}
