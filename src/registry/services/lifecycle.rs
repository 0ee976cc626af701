//! Loading, activation and rendering of registry items.

use crate::catalog::domain::{ProviderContribution, ProviderKind, ProviderName, ToolDefinition};
use crate::catalog::services::{CatalogAggregator, CatalogError};
use crate::registry::domain::{
    ItemKind, ItemState, Prompt, RegistryDomainError, RegistryItem, Skill,
};
use crate::registry::ports::{RegistryStore, StoreError};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Errors returned by registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The item definition is invalid.
    #[error(transparent)]
    Domain(#[from] RegistryDomainError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Publishing skills to the catalog failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// No item with this kind and name exists.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Item kind.
        kind: ItemKind,
        /// Item name.
        name: String,
    },

    /// The item exists but is not active.
    #[error("{kind} '{name}' is not active")]
    NotActive {
        /// Item kind.
        kind: ItemKind,
        /// Item name.
        name: String,
    },

    /// Another state change of the same item is in progress.
    #[error("a state change of {kind} '{name}' is already in progress")]
    TransitionInFlight {
        /// Item kind.
        kind: ItemKind,
        /// Item name.
        name: String,
    },

    /// A skill step references a tool that is not in the catalog.
    #[error("skill '{skill}' step {step} references '{tool}', which is not in the catalog")]
    UnresolvedTool {
        /// Skill name.
        skill: String,
        /// One-based step index.
        step: usize,
        /// Namespaced tool name.
        tool: String,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Default)]
struct Items {
    prompts: BTreeMap<String, Prompt>,
    skills: BTreeMap<String, Skill>,
}

impl Items {
    fn get(&self, kind: ItemKind, name: &str) -> Option<RegistryItem> {
        match kind {
            ItemKind::Prompt => self.prompts.get(name).cloned().map(RegistryItem::Prompt),
            ItemKind::Skill => self.skills.get(name).cloned().map(RegistryItem::Skill),
        }
    }

    fn insert(&mut self, item: RegistryItem) -> Option<RegistryItem> {
        match item {
            RegistryItem::Prompt(prompt) => self
                .prompts
                .insert(prompt.name.clone(), prompt)
                .map(RegistryItem::Prompt),
            RegistryItem::Skill(skill) => self
                .skills
                .insert(skill.name.clone(), skill)
                .map(RegistryItem::Skill),
        }
    }

    fn list(&self, kind: ItemKind) -> Vec<RegistryItem> {
        match kind {
            ItemKind::Prompt => self
                .prompts
                .values()
                .cloned()
                .map(RegistryItem::Prompt)
                .collect(),
            ItemKind::Skill => self
                .skills
                .values()
                .cloned()
                .map(RegistryItem::Skill)
                .collect(),
        }
    }

    fn skill_tools(&self) -> Vec<ToolDefinition> {
        self.skills
            .values()
            .filter(|skill| skill.state() == ItemState::Active)
            .filter_map(|skill| {
                ToolDefinition::new(&skill.name, &skill.description, skill.input_schema()).ok()
            })
            .collect()
    }
}

struct TransitionGuard<'a> {
    in_flight: &'a Mutex<HashSet<(ItemKind, String)>>,
    key: (ItemKind, String),
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Registry of prompts and skills with lifecycle management.
pub struct RegistryService {
    store: Arc<dyn RegistryStore>,
    catalog: Arc<CatalogAggregator>,
    items: RwLock<Items>,
    in_flight: Mutex<HashSet<(ItemKind, String)>>,
}

impl RegistryService {
    /// Creates an empty registry backed by `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RegistryStore>, catalog: Arc<CatalogAggregator>) -> Self {
        Self {
            store,
            catalog,
            items: RwLock::new(Items::default()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn begin(&self, kind: ItemKind, name: &str) -> RegistryResult<TransitionGuard<'_>> {
        let key = (kind, name.to_owned());
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(key.clone()) {
            return Err(RegistryError::TransitionInFlight {
                kind,
                name: name.to_owned(),
            });
        }
        Ok(TransitionGuard {
            in_flight: &self.in_flight,
            key,
        })
    }

    async fn persist(&self, item: &RegistryItem) -> RegistryResult<()> {
        let document = serde_json::to_value(item).map_err(|err| StoreError::InvalidDocument {
            kind: item.kind(),
            name: item.name().to_owned(),
            message: err.to_string(),
        })?;
        self.store.save(item.kind(), item.name(), &document).await?;
        Ok(())
    }

    fn publish_skills(&self, items: &Items) -> RegistryResult<()> {
        self.catalog.publish(ProviderContribution::new(
            ProviderName::registry(),
            ProviderKind::Registry,
            items.skill_tools(),
        ))?;
        Ok(())
    }

    /// Reloads every stored item, keeping stored lifecycle states.
    ///
    /// Documents that fail to parse or validate are skipped with a warning.
    /// Returns the number of items restored.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the store cannot be read or skills
    /// cannot be published.
    pub async fn restore(&self) -> RegistryResult<usize> {
        let documents = self.store.load_all().await?;
        let mut items = self.items.write().await;
        let mut restored = 0_usize;
        for (kind, document) in documents {
            let item = match RegistryItem::from_document(kind, document) {
                Ok(item) => item,
                Err(err) => {
                    warn!(%kind, "skipping unreadable registry document: {err}");
                    continue;
                }
            };
            if let Err(err) = item.validate() {
                warn!(%kind, name = item.name(), "skipping invalid registry item: {err}");
                continue;
            }
            items.insert(item);
            restored = restored.saturating_add(1);
        }
        self.publish_skills(&items)?;
        info!(restored, "registry restored");
        Ok(restored)
    }

    /// Stores an item definition as a draft, replacing any previous
    /// definition of the same kind and name.
    ///
    /// Only the structure is validated here; tool references are resolved
    /// on activation.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when validation or persistence fails, or a
    /// transition of the same item is in flight.
    pub async fn load(&self, item: RegistryItem) -> RegistryResult<RegistryItem> {
        item.validate()?;
        let draft = match item {
            RegistryItem::Prompt(prompt) => RegistryItem::Prompt(prompt.into_draft()),
            RegistryItem::Skill(skill) => RegistryItem::Skill(skill.into_draft()),
        };
        let _guard = self.begin(draft.kind(), draft.name())?;
        self.persist(&draft).await?;

        let mut items = self.items.write().await;
        let previous = items.insert(draft.clone());
        let was_active = previous.is_some_and(|old| old.state() == ItemState::Active);
        if was_active && draft.kind() == ItemKind::Skill {
            self.publish_skills(&items)?;
        }
        info!(kind = %draft.kind(), name = draft.name(), replaced_active = was_active, "registry item loaded");
        Ok(draft)
    }

    /// Activates an item, making it listed and invocable.
    ///
    /// Skills are re-validated and every step tool must be in the current
    /// catalog. On failure the item keeps its previous state.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the item is unknown, validation fails,
    /// persistence fails, or another transition is in flight.
    pub async fn activate(&self, kind: ItemKind, name: &str) -> RegistryResult<RegistryItem> {
        self.transition(kind, name, ItemState::Active).await
    }

    /// Disables an item, hiding it from listings while keeping it stored.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the item is unknown, persistence fails,
    /// or another transition is in flight.
    pub async fn disable(&self, kind: ItemKind, name: &str) -> RegistryResult<RegistryItem> {
        self.transition(kind, name, ItemState::Disabled).await
    }

    async fn transition(
        &self,
        kind: ItemKind,
        name: &str,
        target: ItemState,
    ) -> RegistryResult<RegistryItem> {
        let _guard = self.begin(kind, name)?;
        let mut item = self.get(kind, name).await?;
        item.transition_to(target)?;
        if target == ItemState::Active {
            item.validate()?;
            if let RegistryItem::Skill(skill) = &item {
                self.check_tools(skill)?;
            }
        }
        self.persist(&item).await?;

        let mut items = self.items.write().await;
        items.insert(item.clone());
        if kind == ItemKind::Skill {
            self.publish_skills(&items)?;
        }
        info!(%kind, name, state = %target, "registry item state changed");
        Ok(item)
    }

    fn check_tools(&self, skill: &Skill) -> RegistryResult<()> {
        let snapshot = self.catalog.snapshot();
        for (position, reference) in skill.tool_references()?.iter().enumerate() {
            let tool = reference.to_string();
            if !snapshot.contains(&tool) {
                return Err(RegistryError::UnresolvedTool {
                    skill: skill.name.clone(),
                    step: position.saturating_add(1),
                    tool,
                });
            }
        }
        Ok(())
    }

    /// Returns an item in any state.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when no such item exists.
    pub async fn get(&self, kind: ItemKind, name: &str) -> RegistryResult<RegistryItem> {
        self.items
            .read()
            .await
            .get(kind, name)
            .ok_or_else(|| RegistryError::NotFound {
                kind,
                name: name.to_owned(),
            })
    }

    /// Lists items of `kind` in every state, ordered by name.
    #[must_use]
    pub async fn list(&self, kind: ItemKind) -> Vec<RegistryItem> {
        self.items.read().await.list(kind)
    }

    /// Lists active items of `kind`, ordered by name.
    #[must_use]
    pub async fn list_active(&self, kind: ItemKind) -> Vec<RegistryItem> {
        self.items
            .read()
            .await
            .list(kind)
            .into_iter()
            .filter(|item| item.state() == ItemState::Active)
            .collect()
    }

    /// Lists active prompts, ordered by name.
    #[must_use]
    pub async fn active_prompts(&self) -> Vec<Prompt> {
        self.items
            .read()
            .await
            .prompts
            .values()
            .filter(|prompt| prompt.state() == ItemState::Active)
            .cloned()
            .collect()
    }

    /// Returns an active skill.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] or [`RegistryError::NotActive`].
    pub async fn active_skill(&self, name: &str) -> RegistryResult<Skill> {
        match self.get(ItemKind::Skill, name).await? {
            RegistryItem::Skill(skill) if skill.state() == ItemState::Active => Ok(skill),
            RegistryItem::Skill(_) | RegistryItem::Prompt(_) => Err(RegistryError::NotActive {
                kind: ItemKind::Skill,
                name: name.to_owned(),
            }),
        }
    }

    /// Returns a skill in any state.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when no such skill exists.
    pub async fn skill(&self, name: &str) -> RegistryResult<Skill> {
        match self.get(ItemKind::Skill, name).await? {
            RegistryItem::Skill(skill) => Ok(skill),
            RegistryItem::Prompt(_) => Err(RegistryError::NotFound {
                kind: ItemKind::Skill,
                name: name.to_owned(),
            }),
        }
    }

    async fn prompt(&self, name: &str) -> RegistryResult<Prompt> {
        match self.get(ItemKind::Prompt, name).await? {
            RegistryItem::Prompt(prompt) => Ok(prompt),
            RegistryItem::Skill(_) => Err(RegistryError::NotFound {
                kind: ItemKind::Prompt,
                name: name.to_owned(),
            }),
        }
    }

    /// Renders an active prompt.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotActive`] for inactive prompts and
    /// rendering errors from [`Prompt::render`].
    pub async fn render_prompt(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> RegistryResult<String> {
        let prompt = self.prompt(name).await?;
        if prompt.state() != ItemState::Active {
            return Err(RegistryError::NotActive {
                kind: ItemKind::Prompt,
                name: name.to_owned(),
            });
        }
        Ok(prompt.render(arguments)?)
    }

    /// Renders a prompt in any state, for testing definitions.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] and rendering errors from
    /// [`Prompt::render`].
    pub async fn preview_prompt(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> RegistryResult<String> {
        Ok(self.prompt(name).await?.render(arguments)?)
    }
}
