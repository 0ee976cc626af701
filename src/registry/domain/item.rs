//! Item kinds, lifecycle states and the kind-erased item wrapper.

use super::{Prompt, RegistryDomainError, Skill};
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_ITEM_NAME_LENGTH: usize = 100;

/// Kind of registry item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Prompt template.
    Prompt,
    /// Multi-step skill.
    Skill,
}

impl ItemKind {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Skill => "skill",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ItemKind {
    type Error = RegistryDomainError;

    /// Accepts singular and plural spellings.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prompt" | "prompts" => Ok(Self::Prompt),
            "skill" | "skills" => Ok(Self::Skill),
            other => Err(RegistryDomainError::UnknownKind(other.to_owned())),
        }
    }
}

/// Lifecycle state of a registry item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Stored but not listed.
    #[default]
    Draft,
    /// Listed and invocable.
    Active,
    /// Stored, not listed, kept for history.
    Disabled,
}

impl ItemState {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }

    /// Returns whether moving to `target` is allowed.
    ///
    /// Items never return to draft.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Draft | Self::Disabled | Self::Active, Self::Active)
                | (Self::Draft | Self::Active | Self::Disabled, Self::Disabled)
        )
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

pub(super) fn validate_item_name(name: &str) -> Result<(), RegistryDomainError> {
    let is_valid = !name.is_empty()
        && name.len() <= MAX_ITEM_NAME_LENGTH
        && !name.contains("__")
        && name
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '-' | '_'));
    if is_valid {
        Ok(())
    } else {
        Err(RegistryDomainError::InvalidName(name.to_owned()))
    }
}

pub(super) fn check_transition(
    current: ItemState,
    target: ItemState,
) -> Result<(), RegistryDomainError> {
    if current.can_transition_to(target) {
        Ok(())
    } else {
        Err(RegistryDomainError::InvalidStateTransition {
            from: current.to_string(),
            to: target.to_string(),
        })
    }
}

/// A prompt or a skill.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RegistryItem {
    /// Prompt template.
    Prompt(Prompt),
    /// Multi-step skill.
    Skill(Skill),
}

impl RegistryItem {
    /// Returns the item kind.
    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        match self {
            Self::Prompt(_) => ItemKind::Prompt,
            Self::Skill(_) => ItemKind::Skill,
        }
    }

    /// Returns the item name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Prompt(prompt) => &prompt.name,
            Self::Skill(skill) => &skill.name,
        }
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ItemState {
        match self {
            Self::Prompt(prompt) => prompt.state(),
            Self::Skill(skill) => skill.state(),
        }
    }

    /// Checks structural validity without consulting the catalog.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryDomainError`] found.
    pub fn validate(&self) -> Result<(), RegistryDomainError> {
        match self {
            Self::Prompt(prompt) => prompt.validate(),
            Self::Skill(skill) => skill.validate(),
        }
    }

    /// Moves the item to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::InvalidStateTransition`] when the move
    /// is not allowed.
    pub fn transition_to(&mut self, target: ItemState) -> Result<(), RegistryDomainError> {
        match self {
            Self::Prompt(prompt) => prompt.transition_to(target),
            Self::Skill(skill) => skill.transition_to(target),
        }
    }

    /// Parses a stored document of `kind`, keeping its lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when the document does not match the
    /// item shape.
    pub fn from_document(kind: ItemKind, document: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            ItemKind::Prompt => Self::Prompt(serde_json::from_value(document)?),
            ItemKind::Skill => Self::Skill(serde_json::from_value(document)?),
        })
    }
}
