//! Snapshot publisher for the merged catalog.
//!
//! Writers hand complete provider contributions to [`CatalogAggregator`],
//! which rebuilds the merged snapshot off to the side and swaps it in through
//! a `tokio::sync::watch` channel. Readers clone the current `Arc` and never
//! observe a partially merged catalog.

use crate::catalog::domain::{
    AccessPolicy, CatalogSnapshot, CatalogView, ProviderContribution, ProviderKind, ProviderName,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

/// Errors returned by catalog publication.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// The provider name is already claimed by another provider kind.
    #[error("provider name '{name}' is already used by a {existing} provider")]
    ProviderConflict {
        /// Contested provider name.
        name: String,
        /// Kind currently holding the name.
        existing: ProviderKind,
    },

    /// The provider was never reserved.
    #[error("provider '{0}' is not reserved")]
    UnknownProvider(String),

    /// Internal state could not be accessed.
    #[error("catalog state unavailable: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl CatalogError {
    fn poisoned(err: impl ToString) -> Self {
        Self::Runtime(Arc::new(std::io::Error::other(err.to_string())))
    }
}

/// Result type for catalog publication.
pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Default)]
struct Contributions {
    reservations: HashMap<ProviderName, ProviderKind>,
    live: BTreeMap<ProviderName, ProviderContribution>,
    revision: u64,
}

/// Merges provider contributions into atomically swapped snapshots.
#[derive(Debug)]
pub struct CatalogAggregator {
    contributions: Mutex<Contributions>,
    policies: RwLock<HashMap<ProviderName, Arc<AccessPolicy>>>,
    sender: watch::Sender<Arc<CatalogSnapshot>>,
}

impl Default for CatalogAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogAggregator {
    /// Creates an aggregator with an empty catalog and the registry provider
    /// name reserved.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Arc::new(CatalogSnapshot::default()));
        let mut reservations = HashMap::new();
        reservations.insert(ProviderName::registry(), ProviderKind::Registry);
        Self {
            contributions: Mutex::new(Contributions {
                reservations,
                ..Contributions::default()
            }),
            policies: RwLock::new(HashMap::new()),
            sender,
        }
    }

    /// Claims `name` for a provider of `kind`.
    ///
    /// Re-reserving a name for the same kind is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ProviderConflict`] when another kind holds the
    /// name.
    pub fn reserve(&self, name: &ProviderName, kind: ProviderKind) -> CatalogResult<()> {
        let mut state = self.contributions.lock().map_err(CatalogError::poisoned)?;
        match state.reservations.get(name) {
            Some(existing) if *existing != kind => Err(CatalogError::ProviderConflict {
                name: name.to_string(),
                existing: *existing,
            }),
            Some(_) => Ok(()),
            None => {
                state.reservations.insert(name.clone(), kind);
                Ok(())
            }
        }
    }

    /// Releases a reservation and withdraws any live contribution.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Runtime`] when internal state is unavailable.
    pub fn release(&self, name: &ProviderName) -> CatalogResult<()> {
        let mut state = self.contributions.lock().map_err(CatalogError::poisoned)?;
        state.reservations.remove(name);
        if state.live.remove(name).is_some() {
            self.republish(&mut state);
        }
        Ok(())
    }

    /// Replaces the contribution of a reserved provider.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownProvider`] when the provider was never
    /// reserved and [`CatalogError::ProviderConflict`] when the kind differs
    /// from the reservation.
    pub fn publish(&self, contribution: ProviderContribution) -> CatalogResult<()> {
        let mut state = self.contributions.lock().map_err(CatalogError::poisoned)?;
        let provider = contribution.provider().clone();
        match state.reservations.get(&provider) {
            None => return Err(CatalogError::UnknownProvider(provider.to_string())),
            Some(existing) if *existing != contribution.kind() => {
                return Err(CatalogError::ProviderConflict {
                    name: provider.to_string(),
                    existing: *existing,
                });
            }
            Some(_) => {}
        }
        state.live.insert(provider, contribution);
        self.republish(&mut state);
        Ok(())
    }

    /// Removes a provider's tools from the catalog.
    ///
    /// The new snapshot is visible to every reader when this returns.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Runtime`] when internal state is unavailable.
    pub fn withdraw(&self, provider: &ProviderName) -> CatalogResult<()> {
        let mut state = self.contributions.lock().map_err(CatalogError::poisoned)?;
        if state.live.remove(provider).is_some() {
            self.republish(&mut state);
        }
        Ok(())
    }

    fn republish(&self, state: &mut Contributions) {
        let next_revision = state.revision.saturating_add(1);
        let candidate = CatalogSnapshot::build(next_revision, state.live.values());
        let current = self.sender.borrow().clone();
        if current.fingerprint() == candidate.fingerprint() {
            return;
        }
        state.revision = next_revision;
        debug!(
            revision = next_revision,
            tools = candidate.len(),
            "publishing catalog snapshot"
        );
        self.sender.send_replace(Arc::new(candidate));
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.sender.borrow().clone()
    }

    /// Subscribes to snapshot publications.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<CatalogSnapshot>> {
        self.sender.subscribe()
    }

    /// Declares the agent-level filter for `caller`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Runtime`] when internal state is unavailable.
    pub fn set_access_policy(&self, caller: ProviderName, policy: AccessPolicy) -> CatalogResult<()> {
        let mut policies = self.policies.write().map_err(CatalogError::poisoned)?;
        policies.insert(caller, Arc::new(policy));
        Ok(())
    }

    /// Removes the agent-level filter for `caller`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Runtime`] when internal state is unavailable.
    pub fn clear_access_policy(&self, caller: &ProviderName) -> CatalogResult<()> {
        let mut policies = self.policies.write().map_err(CatalogError::poisoned)?;
        policies.remove(caller);
        Ok(())
    }

    /// Returns the catalog as seen by `caller`.
    ///
    /// Callers without a declared policy see every tool the providers expose.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Runtime`] when internal state is unavailable.
    pub fn view(&self, caller: Option<&ProviderName>) -> CatalogResult<CatalogView> {
        let policy = match caller {
            Some(name) => self
                .policies
                .read()
                .map_err(CatalogError::poisoned)?
                .get(name)
                .cloned(),
            None => None,
        };
        Ok(CatalogView::new(self.snapshot(), caller.cloned(), policy))
    }
}
