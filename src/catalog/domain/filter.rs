//! Ordered tool allow-lists.

use super::{CatalogDomainError, ToolDefinition};
use serde::{Deserialize, Serialize};

/// Ordered allow-list of tool names. An empty list allows every tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ToolFilter(Vec<String>);

impl ToolFilter {
    /// Creates a filter that allows every tool.
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self(Vec::new())
    }

    /// Creates a filter that allows only the listed tools.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError`] when an entry is empty or repeated.
    pub fn allow<I, S>(names: I) -> Result<Self, CatalogDomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<String> = Vec::new();
        for name in names {
            let normalized = name.into().trim().to_owned();
            if normalized.is_empty() {
                return Err(CatalogDomainError::EmptyToolName);
            }
            if entries.contains(&normalized) {
                return Err(CatalogDomainError::DuplicateFilterEntry(normalized));
            }
            entries.push(normalized);
        }
        Ok(Self(entries))
    }

    /// Returns whether the filter allows every tool.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns whether `tool` passes the filter.
    #[must_use]
    pub fn allows(&self, tool: &str) -> bool {
        self.is_unrestricted() || self.0.iter().any(|entry| entry == tool)
    }

    /// Returns the allow-list entries in declared order.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.0
    }

    /// Keeps the tools that pass the filter, in the order they were given.
    #[must_use]
    pub fn apply(&self, tools: &[ToolDefinition]) -> Vec<ToolDefinition> {
        tools
            .iter()
            .filter(|tool| self.allows(tool.name()))
            .cloned()
            .collect()
    }

    /// Returns allow-list entries that match none of `tools`.
    #[must_use]
    pub fn unmatched(&self, tools: &[ToolDefinition]) -> Vec<String> {
        self.0
            .iter()
            .filter(|entry| !tools.iter().any(|tool| tool.name() == entry.as_str()))
            .cloned()
            .collect()
    }
}

impl TryFrom<Vec<String>> for ToolFilter {
    type Error = CatalogDomainError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::allow(value)
    }
}

impl From<ToolFilter> for Vec<String> {
    fn from(value: ToolFilter) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::domain::InputSchema;

    fn tools(names: &[&str]) -> Vec<ToolDefinition> {
        names
            .iter()
            .map(|name| ToolDefinition::new(*name, "", InputSchema::object()).expect("valid tool"))
            .collect()
    }

    #[test]
    fn empty_filter_allows_everything() {
        let filter = ToolFilter::unrestricted();
        let advertised = tools(&["read", "write"]);

        assert_eq!(filter.apply(&advertised), advertised);
    }

    #[test]
    fn apply_keeps_advertised_order() {
        let filter = ToolFilter::allow(["write", "read"]).expect("valid filter");
        let advertised = tools(&["read", "delete", "write"]);

        let names: Vec<_> = filter
            .apply(&advertised)
            .iter()
            .map(|tool| tool.name().to_owned())
            .collect();
        assert_eq!(names, vec!["read", "write"]);
    }

    #[test]
    fn unmatched_reports_unknown_entries() {
        let filter = ToolFilter::allow(["read", "missing"]).expect("valid filter");

        assert_eq!(filter.unmatched(&tools(&["read"])), vec!["missing"]);
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        assert_eq!(
            ToolFilter::allow(["read", "read"]),
            Err(CatalogDomainError::DuplicateFilterEntry("read".to_owned()))
        );
    }
}
