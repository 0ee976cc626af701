//! Addressing and credentials for agent peers.

use super::AgentDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Header carrying credentials when none is configured.
pub const DEFAULT_AUTH_HEADER: &str = "Authorization";

fn default_header() -> String {
    DEFAULT_AUTH_HEADER.to_owned()
}

/// How a credential is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `Bearer <token>`.
    Bearer,
    /// The raw token.
    ApiKey,
}

/// Credential sent with every request to a remote agent.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAuth {
    /// Presentation scheme.
    #[serde(rename = "type")]
    pub scheme: AuthScheme,
    /// Secret token.
    pub token: String,
    /// Header name carrying the credential.
    #[serde(default = "default_header")]
    pub header: String,
}

impl fmt::Debug for AgentAuth {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AgentAuth")
            .field("scheme", &self.scheme)
            .field("token", &"<redacted>")
            .field("header", &self.header)
            .finish()
    }
}

impl AgentAuth {
    /// Bearer token in the `Authorization` header.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            scheme: AuthScheme::Bearer,
            token: token.into(),
            header: default_header(),
        }
    }

    /// Raw API key in `header`.
    #[must_use]
    pub fn api_key(token: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            scheme: AuthScheme::ApiKey,
            token: token.into(),
            header: header.into(),
        }
    }

    /// Returns the header name and value to send.
    #[must_use]
    pub fn header_pair(&self) -> (&str, String) {
        let value = match self.scheme {
            AuthScheme::Bearer => format!("Bearer {}", self.token),
            AuthScheme::ApiKey => self.token.clone(),
        };
        (self.header.trim(), value)
    }

    /// Checks that the credential can be sent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError::InvalidAuth`] for an empty token or
    /// header name, or a header name with characters HTTP does not allow.
    pub fn validate(&self, agent: &str) -> Result<(), AgentDomainError> {
        let invalid = |reason: &str| AgentDomainError::InvalidAuth {
            agent: agent.to_owned(),
            reason: reason.to_owned(),
        };
        if self.token.trim().is_empty() {
            return Err(invalid("token is empty"));
        }
        let header = self.header.trim();
        if header.is_empty() {
            return Err(invalid("header name is empty"));
        }
        if !header
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || "-_".contains(character))
        {
            return Err(invalid("header name contains invalid characters"));
        }
        Ok(())
    }
}

/// Where a peer request goes and which credential it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPeer {
    /// Target URL.
    pub url: String,
    /// Credential, if the agent requires one.
    pub auth: Option<AgentAuth>,
}

impl AgentPeer {
    /// Addresses `url` without credentials.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: None,
        }
    }

    /// Attaches a credential.
    #[must_use]
    pub fn with_auth(self, auth: Option<AgentAuth>) -> Self {
        Self { auth, ..self }
    }
}
