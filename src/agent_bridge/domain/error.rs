//! Error types for agent domain validation.

use thiserror::Error;

/// Errors returned while validating agent declarations and cards.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentDomainError {
    /// The agent has neither an endpoint nor an inline card.
    #[error("agent '{0}' needs an endpoint or an inline capability card")]
    MissingEndpoint(String),

    /// A remote agent was declared with an inline card.
    #[error("remote agent '{0}' must be discovered, not declared with a card")]
    RemoteCard(String),

    /// A card skill has an empty identifier.
    #[error("agent '{agent}' advertises a skill without an id")]
    EmptySkillId {
        /// Card name.
        agent: String,
    },

    /// A card lists the same skill identifier twice.
    #[error("agent '{agent}' advertises skill '{skill}' more than once")]
    DuplicateSkill {
        /// Card name.
        agent: String,
        /// Repeated skill identifier.
        skill: String,
    },

    /// A skill identifier cannot be used as a tool name.
    #[error("agent '{agent}' skill '{skill}' is not a valid tool name")]
    InvalidSkillId {
        /// Card name.
        agent: String,
        /// Offending skill identifier.
        skill: String,
    },

    /// A remote agent credential cannot be used.
    #[error("agent '{agent}' has an invalid credential: {reason}")]
    InvalidAuth {
        /// Agent name.
        agent: String,
        /// What is wrong with it.
        reason: String,
    },
}
