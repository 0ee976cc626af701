//! In-memory registry store.

use crate::registry::domain::ItemKind;
use crate::registry::ports::{RegistryStore, StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Thread-safe store keeping documents in a map.
#[derive(Debug, Default)]
pub struct InMemoryRegistryStore {
    documents: RwLock<BTreeMap<(ItemKind, String), Value>>,
}

impl InMemoryRegistryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with documents.
    #[must_use]
    pub fn with_documents(documents: impl IntoIterator<Item = (ItemKind, String, Value)>) -> Self {
        Self {
            documents: RwLock::new(
                documents
                    .into_iter()
                    .map(|(kind, name, document)| ((kind, name), document))
                    .collect(),
            ),
        }
    }

    /// Returns the stored document for `kind`/`name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Runtime`] when the lock is poisoned.
    pub fn document(&self, kind: ItemKind, name: &str) -> StoreResult<Option<Value>> {
        let documents = self
            .documents
            .read()
            .map_err(|err| StoreError::runtime(std::io::Error::other(err.to_string())))?;
        Ok(documents.get(&(kind, name.to_owned())).cloned())
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn save(&self, kind: ItemKind, name: &str, document: &Value) -> StoreResult<()> {
        let mut documents = self
            .documents
            .write()
            .map_err(|err| StoreError::runtime(std::io::Error::other(err.to_string())))?;
        documents.insert((kind, name.to_owned()), document.clone());
        Ok(())
    }

    async fn load_all(&self) -> StoreResult<Vec<(ItemKind, Value)>> {
        let documents = self
            .documents
            .read()
            .map_err(|err| StoreError::runtime(std::io::Error::other(err.to_string())))?;
        Ok(documents
            .iter()
            .map(|((kind, _), document)| (*kind, document.clone()))
            .collect())
    }
}
