//! Agent declarations from the topology input.

use super::{AgentAuth, AgentCard, AgentDomainError, AgentPeer};
use crate::catalog::domain::ProviderName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an agent runs relative to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Part of the same topology; may be declared with its card inline.
    Local,
    /// Reached over the network; its card must be fetched.
    Remote,
}

impl AgentRole {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A declared agent peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDeclaration {
    /// Provider name prefixing the agent's skills.
    pub name: ProviderName,
    /// Local or remote.
    pub role: AgentRole,
    /// Base URL serving the capability card and messages.
    #[serde(default)]
    pub endpoint: String,
    /// Card of a local agent, registered without discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<AgentCard>,
    /// Credential sent with every request to the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AgentAuth>,
}

impl AgentDeclaration {
    /// Declares a remote agent discovered at `endpoint`.
    #[must_use]
    pub fn remote(name: ProviderName, endpoint: impl Into<String>) -> Self {
        Self {
            name,
            role: AgentRole::Remote,
            endpoint: endpoint.into(),
            card: None,
            auth: None,
        }
    }

    /// Declares a local agent with its card inline.
    #[must_use]
    pub fn local(name: ProviderName, endpoint: impl Into<String>, card: AgentCard) -> Self {
        Self {
            name,
            role: AgentRole::Local,
            endpoint: endpoint.into(),
            card: Some(card),
            auth: None,
        }
    }

    /// Sends `auth` with every request to the agent.
    #[must_use]
    pub fn with_auth(self, auth: AgentAuth) -> Self {
        Self {
            auth: Some(auth),
            ..self
        }
    }

    /// Checks the declaration and any inline card.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError`] when a remote agent has no endpoint or
    /// carries a card, when a local agent has neither, or when the inline
    /// card or the credential is invalid.
    pub fn validate(&self) -> Result<(), AgentDomainError> {
        if let Some(auth) = &self.auth {
            auth.validate(self.name.as_str())?;
        }
        let has_endpoint = !self.endpoint.trim().is_empty();
        match (self.role, &self.card) {
            (AgentRole::Remote, Some(_)) => Err(AgentDomainError::RemoteCard(self.name.to_string())),
            (_, None) if !has_endpoint => {
                Err(AgentDomainError::MissingEndpoint(self.name.to_string()))
            }
            (_, Some(card)) => card.validate(),
            (_, None) => Ok(()),
        }
    }

    /// Returns where messages are posted: the card URL when known, the
    /// declared endpoint otherwise.
    #[must_use]
    pub fn message_url<'a>(&'a self, card: Option<&'a AgentCard>) -> &'a str {
        card.map(|known| known.url.trim())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.endpoint.trim())
    }

    /// Addresses the declared endpoint, where the card is served.
    #[must_use]
    pub fn card_peer(&self) -> AgentPeer {
        AgentPeer::new(self.endpoint.trim()).with_auth(self.auth.clone())
    }

    /// Addresses the message URL for `card`.
    #[must_use]
    pub fn message_peer(&self, card: Option<&AgentCard>) -> AgentPeer {
        AgentPeer::new(self.message_url(card)).with_auth(self.auth.clone())
    }
}
