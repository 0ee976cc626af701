//! Error types for catalog domain validation.

use thiserror::Error;

/// Errors returned while constructing catalog domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogDomainError {
    /// The provider name is empty after trimming.
    #[error("provider name must not be empty")]
    EmptyProviderName,

    /// The provider name contains characters outside `[a-z0-9_-]`.
    #[error(
        "provider name '{0}' contains invalid characters (only lowercase alphanumeric, '-' and '_' allowed)"
    )]
    InvalidProviderName(String),

    /// The provider name contains the namespace separator.
    #[error("provider name '{0}' must not contain the '__' separator")]
    ProviderNameContainsSeparator(String),

    /// The provider name exceeds the 100-character limit.
    #[error("provider name exceeds 100 character limit: {0}")]
    ProviderNameTooLong(String),

    /// A tool name is empty after trimming.
    #[error("tool name must not be empty")]
    EmptyToolName,

    /// A namespaced tool name is missing the `provider__tool` shape.
    #[error("tool name '{0}' is not namespaced as 'provider__tool'")]
    NotNamespaced(String),

    /// A tool filter lists the same tool twice.
    #[error("tool filter lists '{0}' more than once")]
    DuplicateFilterEntry(String),
}

/// Errors returned while resolving a tool name against a caller's view.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogLookupError {
    /// No live provider exposes the tool.
    #[error("tool '{0}' is not in the catalog")]
    UnknownTool(String),

    /// The tool exists but the caller's access policy hides it.
    #[error("caller '{caller}' may not use tool '{tool}'")]
    AccessDenied {
        /// Caller identity.
        caller: String,
        /// Namespaced tool name.
        tool: String,
    },
}
