//! Caller-side access policies (agent-level filters).

use super::{ProviderName, ToolFilter};
use serde::{Deserialize, Serialize};

/// Access to one provider's tools, optionally narrowed by a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderGrant {
    /// Provider whose tools are granted.
    pub provider: ProviderName,
    /// Agent-level allow-list for the provider's tools.
    #[serde(default)]
    pub tools: ToolFilter,
}

/// Agent-level filter declared alongside a consuming caller.
///
/// A caller with a policy sees only the providers it names, further narrowed
/// by each grant's tool filter. The policy is always applied on top of the
/// catalog, which already carries the server-level filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessPolicy {
    grants: Vec<ProviderGrant>,
}

impl AccessPolicy {
    /// Creates a policy from grants.
    #[must_use]
    pub const fn new(grants: Vec<ProviderGrant>) -> Self {
        Self { grants }
    }

    /// Adds a grant for `provider`.
    #[must_use]
    pub fn grant(mut self, provider: ProviderName, tools: ToolFilter) -> Self {
        self.grants.push(ProviderGrant { provider, tools });
        self
    }

    /// Returns the grants in declared order.
    #[must_use]
    pub fn grants(&self) -> &[ProviderGrant] {
        &self.grants
    }

    /// Returns whether `tool` of `provider` is visible to the caller.
    #[must_use]
    pub fn permits(&self, provider: &ProviderName, tool: &str) -> bool {
        self.grants
            .iter()
            .any(|grant| &grant.provider == provider && grant.tools.allows(tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str) -> ProviderName {
        ProviderName::new(name).expect("valid provider")
    }

    #[test]
    fn ungranted_provider_is_hidden() {
        let policy = AccessPolicy::default().grant(provider("github"), ToolFilter::unrestricted());

        assert!(policy.permits(&provider("github"), "create_issue"));
        assert!(!policy.permits(&provider("files"), "read"));
    }

    #[test]
    fn grant_filter_narrows_tools() {
        let policy = AccessPolicy::default().grant(
            provider("files"),
            ToolFilter::allow(["read"]).expect("valid filter"),
        );

        assert!(policy.permits(&provider("files"), "read"));
        assert!(!policy.permits(&provider("files"), "write"));
    }

    #[test]
    fn policy_deserializes_from_grant_list() {
        let policy: AccessPolicy = serde_json::from_str(
            r#"[{"provider": "files", "tools": ["read"]}, {"provider": "github"}]"#,
        )
        .expect("policy should parse");

        assert_eq!(policy.grants().len(), 2);
        assert!(policy.permits(&provider("github"), "anything"));
    }
}
