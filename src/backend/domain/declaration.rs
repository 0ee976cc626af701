//! Backend declarations handed over by the topology loader.

use super::{BackendDomainError, TransportConfig};
use crate::catalog::domain::{ProviderName, ToolFilter};
use serde::{Deserialize, Serialize};

/// One configured backend: identity, transport and server-level filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDeclaration {
    /// Unique backend name, also the catalog prefix.
    pub name: ProviderName,
    /// How the backend is reached.
    pub transport: TransportConfig,
    /// Server-level allow-list. Empty allows every advertised tool.
    #[serde(default, skip_serializing_if = "ToolFilter::is_unrestricted")]
    pub tool_filter: ToolFilter,
}

impl BackendDeclaration {
    /// Creates a declaration without a tool filter.
    #[must_use]
    pub const fn new(name: ProviderName, transport: TransportConfig) -> Self {
        Self {
            name,
            transport,
            tool_filter: ToolFilter::unrestricted(),
        }
    }

    /// Sets the server-level allow-list.
    #[must_use]
    pub fn with_tool_filter(mut self, tool_filter: ToolFilter) -> Self {
        self.tool_filter = tool_filter;
        self
    }

    /// Validates the transport configuration.
    ///
    /// # Errors
    ///
    /// Returns the [`BackendDomainError`] raised by the transport.
    pub fn validate(&self) -> Result<(), BackendDomainError> {
        self.transport.validate()
    }
}
