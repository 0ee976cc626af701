//! Persistence contract for registry items.
//!
//! Items are stored as JSON documents keyed by kind and name. The document
//! keeps the declarative fields in declaration order plus the lifecycle
//! state; how documents reach disk is up to the implementation.

use crate::registry::domain::ItemKind;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by registry stores.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A document could not be encoded or decoded.
    #[error("registry document for {kind} '{name}' is invalid: {message}")]
    InvalidDocument {
        /// Item kind.
        kind: ItemKind,
        /// Item name.
        name: String,
        /// Decoder message.
        message: String,
    },

    /// The backing store failed.
    #[error("registry store failure: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a backing-store failure.
    #[must_use]
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable home for registry documents.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Writes or replaces the document for `kind`/`name`.
    async fn save(&self, kind: ItemKind, name: &str, document: &Value) -> StoreResult<()>;

    /// Returns every stored document.
    async fn load_all(&self) -> StoreResult<Vec<(ItemKind, Value)>>;
}
