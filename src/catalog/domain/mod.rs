//! Domain model for provider names, tool definitions, filters and snapshots.

mod access;
mod error;
mod filter;
mod names;
mod snapshot;
mod tool;

pub use access::{AccessPolicy, ProviderGrant};
pub use error::{CatalogDomainError, CatalogLookupError};
pub use filter::ToolFilter;
pub use names::{NAMESPACE_SEPARATOR, NamespacedToolName, ProviderName, REGISTRY_PROVIDER};
pub use snapshot::{CatalogEntry, CatalogSnapshot, CatalogView, ProviderContribution, ProviderKind};
pub use tool::{ContentBlock, InputSchema, ToolDefinition, ToolOutput};
