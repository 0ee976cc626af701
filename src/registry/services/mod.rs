//! Registry lifecycle orchestration.

mod lifecycle;

pub use lifecycle::{RegistryError, RegistryResult, RegistryService};
