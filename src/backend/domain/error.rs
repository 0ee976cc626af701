//! Error types for backend domain validation and parsing.

use crate::catalog::domain::CatalogDomainError;
use thiserror::Error;

/// Errors returned while constructing backend domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendDomainError {
    /// The backend name is invalid.
    #[error(transparent)]
    Name(#[from] CatalogDomainError),

    /// The process command is empty.
    #[error("process command must not be empty")]
    EmptyCommand,

    /// The working directory is empty after trimming.
    #[error("working directory must not be empty when provided")]
    EmptyWorkingDirectory,

    /// The remote host is empty.
    #[error("remote shell host must not be empty")]
    EmptyHost,

    /// The remote user is empty after trimming.
    #[error("remote shell user must not be empty when provided")]
    EmptyUser,

    /// The URL is empty.
    #[error("endpoint URL must not be empty")]
    EmptyUrl,

    /// The URL does not have an `http://` or `https://` prefix.
    #[error("endpoint URL '{0}' must start with 'http://' or 'https://'")]
    InvalidUrl(String),

    /// Transitioning between two connection states is invalid.
    #[error("invalid backend state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Requested target state.
        to: String,
    },
}

/// Error returned while parsing a backend state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown backend state: {0}")]
pub struct ParseBackendStateError(pub String);
