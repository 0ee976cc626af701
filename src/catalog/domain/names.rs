//! Provider names and namespaced tool names.

use super::CatalogDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the provider prefix and the tool name on the wire.
pub const NAMESPACE_SEPARATOR: &str = "__";

/// Provider name reserved for skills published by the registry.
pub const REGISTRY_PROVIDER: &str = "registry";

const MAX_PROVIDER_NAME_LENGTH: usize = 100;

/// Validated name of a tool provider (backend, agent or the registry).
///
/// Provider names prefix every tool they contribute, so they may never
/// contain the namespace separator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderName(String);

impl ProviderName {
    /// Creates a validated provider name.
    ///
    /// The input is trimmed and lowercased. Only characters in `[a-z0-9_-]`
    /// are accepted and the `__` separator is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError`] when validation fails.
    pub fn new(value: impl Into<String>) -> Result<Self, CatalogDomainError> {
        let normalized = value.into().trim().to_ascii_lowercase();

        if normalized.is_empty() {
            return Err(CatalogDomainError::EmptyProviderName);
        }

        let is_valid = normalized.chars().all(|character| {
            character.is_ascii_lowercase()
                || character.is_ascii_digit()
                || character == '_'
                || character == '-'
        });
        if !is_valid {
            return Err(CatalogDomainError::InvalidProviderName(normalized));
        }

        if normalized.contains(NAMESPACE_SEPARATOR) {
            return Err(CatalogDomainError::ProviderNameContainsSeparator(
                normalized,
            ));
        }

        if normalized.len() > MAX_PROVIDER_NAME_LENGTH {
            return Err(CatalogDomainError::ProviderNameTooLong(normalized));
        }

        Ok(Self(normalized))
    }

    /// Returns the reserved registry provider name.
    #[must_use]
    pub fn registry() -> Self {
        Self(REGISTRY_PROVIDER.to_owned())
    }

    /// Returns whether this is the reserved registry provider.
    #[must_use]
    pub fn is_registry(&self) -> bool {
        self.0 == REGISTRY_PROVIDER
    }

    /// Returns the provider name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProviderName {
    type Error = CatalogDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProviderName> for String {
    fn from(value: ProviderName) -> Self {
        value.0
    }
}

impl AsRef<str> for ProviderName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Externally visible tool name of the form `provider__tool`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespacedToolName {
    provider: ProviderName,
    tool: String,
}

impl NamespacedToolName {
    /// Combines a provider and a provider-local tool name.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError::EmptyToolName`] when `tool` is empty
    /// after trimming.
    pub fn new(provider: ProviderName, tool: impl Into<String>) -> Result<Self, CatalogDomainError> {
        let normalized_tool = tool.into().trim().to_owned();
        if normalized_tool.is_empty() {
            return Err(CatalogDomainError::EmptyToolName);
        }
        Ok(Self {
            provider,
            tool: normalized_tool,
        })
    }

    /// Splits `provider__tool` at the first separator.
    ///
    /// Tool names may themselves contain the separator; provider names never
    /// do, so the first occurrence is always the boundary.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError`] when the separator is missing or either
    /// half is invalid.
    pub fn parse(value: &str) -> Result<Self, CatalogDomainError> {
        let (provider, tool) = value
            .split_once(NAMESPACE_SEPARATOR)
            .ok_or_else(|| CatalogDomainError::NotNamespaced(value.to_owned()))?;
        if tool.trim().is_empty() {
            return Err(CatalogDomainError::NotNamespaced(value.to_owned()));
        }
        Self::new(ProviderName::new(provider)?, tool)
    }

    /// Returns the owning provider.
    #[must_use]
    pub const fn provider(&self) -> &ProviderName {
        &self.provider
    }

    /// Returns the provider-local tool name.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }
}

impl TryFrom<String> for NamespacedToolName {
    type Error = CatalogDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NamespacedToolName> for String {
    fn from(value: NamespacedToolName) -> Self {
        value.to_string()
    }
}

impl fmt::Display for NamespacedToolName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}{NAMESPACE_SEPARATOR}{}",
            self.provider, self.tool
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Local-Stdio", "local-stdio")]
    #[case("  github  ", "github")]
    #[case("agent_1", "agent_1")]
    fn provider_name_is_normalized(#[case] input: &str, #[case] expected: &str) {
        let name = ProviderName::new(input).expect("valid provider name");
        assert_eq!(name.as_str(), expected);
    }

    #[rstest]
    #[case("", CatalogDomainError::EmptyProviderName)]
    #[case("has space", CatalogDomainError::InvalidProviderName("has space".to_owned()))]
    #[case(
        "double__under",
        CatalogDomainError::ProviderNameContainsSeparator("double__under".to_owned())
    )]
    fn invalid_provider_names_are_rejected(
        #[case] input: &str,
        #[case] expected: CatalogDomainError,
    ) {
        assert_eq!(ProviderName::new(input), Err(expected));
    }

    #[test]
    fn namespaced_name_splits_at_first_separator() {
        let name = NamespacedToolName::parse("github__create__issue").expect("valid name");

        assert_eq!(name.provider().as_str(), "github");
        assert_eq!(name.tool(), "create__issue");
        assert_eq!(name.to_string(), "github__create__issue");
    }

    #[rstest]
    #[case("no_separator")]
    #[case("github__")]
    #[case("__tool")]
    fn malformed_namespaced_names_are_rejected(#[case] input: &str) {
        assert!(NamespacedToolName::parse(input).is_err());
    }

    #[test]
    fn provider_name_deserialization_validates() {
        let result: Result<ProviderName, _> = serde_json::from_str("\"bad__name\"");
        assert!(result.is_err());
    }
}
