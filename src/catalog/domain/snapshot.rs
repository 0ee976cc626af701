//! Immutable catalog snapshots and caller-scoped views.

use super::{
    AccessPolicy, CatalogLookupError, NamespacedToolName, ProviderName, ToolDefinition,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Kind of provider contributing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// A JSON-RPC tool backend.
    Backend,
    /// An agent peer exposing skills.
    Agent,
    /// Skills published by the registry.
    Registry,
}

impl ProviderKind {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::Agent => "agent",
            Self::Registry => "registry",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Tools one live provider contributes to the catalog.
///
/// Backend contributions are already narrowed by the server-level filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderContribution {
    provider: ProviderName,
    kind: ProviderKind,
    tools: Vec<ToolDefinition>,
}

impl ProviderContribution {
    /// Creates a contribution.
    #[must_use]
    pub const fn new(provider: ProviderName, kind: ProviderKind, tools: Vec<ToolDefinition>) -> Self {
        Self {
            provider,
            kind,
            tools,
        }
    }

    /// Returns the contributing provider.
    #[must_use]
    pub const fn provider(&self) -> &ProviderName {
        &self.provider
    }

    /// Returns the provider kind.
    #[must_use]
    pub const fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Returns the contributed tools.
    #[must_use]
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }
}

/// One routable tool in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    name: NamespacedToolName,
    kind: ProviderKind,
    tool: ToolDefinition,
}

impl CatalogEntry {
    /// Returns the namespaced name.
    #[must_use]
    pub const fn name(&self) -> &NamespacedToolName {
        &self.name
    }

    /// Returns the owning provider.
    #[must_use]
    pub const fn provider(&self) -> &ProviderName {
        self.name.provider()
    }

    /// Returns the kind of the owning provider.
    #[must_use]
    pub const fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Returns the definition as advertised by the provider.
    #[must_use]
    pub const fn tool(&self) -> &ToolDefinition {
        &self.tool
    }

    /// Returns the definition under its namespaced name.
    #[must_use]
    pub fn exposed(&self) -> ToolDefinition {
        self.tool.renamed(self.name.to_string())
    }
}

/// Complete, immutable merged catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogSnapshot {
    revision: u64,
    fingerprint: String,
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl CatalogSnapshot {
    /// Builds a snapshot from provider contributions.
    ///
    /// Entries keep the contribution order and each contribution's tool order.
    #[must_use]
    pub fn build<'a>(
        revision: u64,
        contributions: impl IntoIterator<Item = &'a ProviderContribution>,
    ) -> Self {
        let mut entries = Vec::new();
        let mut index = HashMap::new();
        let mut hasher = Sha256::new();

        for contribution in contributions {
            for tool in contribution.tools() {
                let Ok(name) = NamespacedToolName::new(contribution.provider().clone(), tool.name())
                else {
                    continue;
                };
                hasher.update(name.to_string().as_bytes());
                hasher.update([0]);
                hasher.update(tool.description().as_bytes());
                hasher.update([0]);
                if let Ok(schema) = serde_json::to_vec(tool.input_schema()) {
                    hasher.update(&schema);
                }
                hasher.update([0]);

                index.insert(name.to_string(), entries.len());
                entries.push(CatalogEntry {
                    name,
                    kind: contribution.kind(),
                    tool: tool.clone(),
                });
            }
        }

        Self {
            revision,
            fingerprint: format!("{:x}", hasher.finalize()),
            entries,
            index,
        }
    }

    /// Returns the publication revision.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the content fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Returns all entries.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Looks up an entry by namespaced name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.index
            .get(name)
            .and_then(|position| self.entries.get(*position))
    }

    /// Returns whether the snapshot contains `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns whether any entry belongs to `provider`.
    #[must_use]
    pub fn has_provider(&self, provider: &ProviderName) -> bool {
        self.entries.iter().any(|entry| entry.provider() == provider)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A snapshot seen through one caller's access policy.
#[derive(Debug, Clone)]
pub struct CatalogView {
    snapshot: Arc<CatalogSnapshot>,
    caller: Option<ProviderName>,
    policy: Option<Arc<AccessPolicy>>,
}

impl CatalogView {
    /// Creates a view.
    #[must_use]
    pub const fn new(
        snapshot: Arc<CatalogSnapshot>,
        caller: Option<ProviderName>,
        policy: Option<Arc<AccessPolicy>>,
    ) -> Self {
        Self {
            snapshot,
            caller,
            policy,
        }
    }

    /// Returns the underlying snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &Arc<CatalogSnapshot> {
        &self.snapshot
    }

    /// Returns the caller this view belongs to.
    #[must_use]
    pub const fn caller(&self) -> Option<&ProviderName> {
        self.caller.as_ref()
    }

    fn permits(&self, entry: &CatalogEntry) -> bool {
        self.policy
            .as_ref()
            .is_none_or(|policy| policy.permits(entry.provider(), entry.tool().name()))
    }

    /// Returns the entries visible to the caller.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.snapshot
            .entries()
            .iter()
            .filter(|entry| self.permits(entry))
    }

    /// Returns the visible tools under their namespaced names.
    #[must_use]
    pub fn tools(&self) -> Vec<ToolDefinition> {
        self.entries().map(CatalogEntry::exposed).collect()
    }

    /// Resolves a namespaced tool for invocation.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogLookupError::UnknownTool`] when no live provider
    /// exposes the tool and [`CatalogLookupError::AccessDenied`] when the
    /// caller's policy hides it.
    pub fn resolve(&self, name: &str) -> Result<&CatalogEntry, CatalogLookupError> {
        let entry = self
            .snapshot
            .get(name)
            .ok_or_else(|| CatalogLookupError::UnknownTool(name.to_owned()))?;
        if !self.permits(entry) {
            return Err(CatalogLookupError::AccessDenied {
                caller: self
                    .caller
                    .as_ref()
                    .map_or_else(String::new, ToString::to_string),
                tool: name.to_owned(),
            });
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::domain::{InputSchema, ToolFilter};

    fn provider(name: &str) -> ProviderName {
        ProviderName::new(name).expect("valid provider")
    }

    fn contribution(name: &str, tools: &[&str]) -> ProviderContribution {
        ProviderContribution::new(
            provider(name),
            ProviderKind::Backend,
            tools
                .iter()
                .map(|tool| ToolDefinition::new(*tool, "", InputSchema::object()).expect("tool"))
                .collect(),
        )
    }

    #[test]
    fn build_prefixes_every_tool() {
        let contributions = [contribution("files", &["read"]), contribution("math", &["add"])];
        let snapshot = CatalogSnapshot::build(1, &contributions);

        let names: Vec<_> = snapshot
            .entries()
            .iter()
            .map(|entry| entry.exposed().name().to_owned())
            .collect();
        assert_eq!(names, vec!["files__read", "math__add"]);
        assert!(snapshot.contains("math__add"));
        assert!(!snapshot.contains("add"));
    }

    #[test]
    fn fingerprint_ignores_revision() {
        let contributions = [contribution("files", &["read"])];
        let first = CatalogSnapshot::build(1, &contributions);
        let second = CatalogSnapshot::build(2, &contributions);

        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_ne!(
            first.fingerprint(),
            CatalogSnapshot::build(3, &[contribution("files", &["write"])]).fingerprint()
        );
    }

    #[test]
    fn view_without_policy_sees_everything() {
        let snapshot = Arc::new(CatalogSnapshot::build(
            1,
            &[contribution("files", &["read", "write"])],
        ));
        let view = CatalogView::new(snapshot, None, None);

        assert_eq!(view.tools().len(), 2);
        assert!(view.resolve("files__write").is_ok());
    }

    #[test]
    fn view_with_policy_denies_hidden_tools() {
        let snapshot = Arc::new(CatalogSnapshot::build(
            1,
            &[contribution("files", &["read", "write"])],
        ));
        let policy = AccessPolicy::default().grant(
            provider("files"),
            ToolFilter::allow(["read", "chmod"]).expect("valid filter"),
        );
        let view = CatalogView::new(snapshot, Some(provider("planner")), Some(Arc::new(policy)));

        let visible: Vec<_> = view
            .tools()
            .iter()
            .map(|tool| tool.name().to_owned())
            .collect();
        assert_eq!(visible, vec!["files__read"]);
        assert_eq!(
            view.resolve("files__write"),
            Err(CatalogLookupError::AccessDenied {
                caller: "planner".to_owned(),
                tool: "files__write".to_owned(),
            })
        );
        assert_eq!(
            view.resolve("files__chmod"),
            Err(CatalogLookupError::UnknownTool("files__chmod".to_owned()))
        );
    }
}
