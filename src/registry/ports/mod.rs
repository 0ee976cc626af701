//! Port contracts for registry item persistence.

mod store;

#[cfg(test)]
pub use store::MockRegistryStore;
pub use store::{RegistryStore, StoreError, StoreResult};
