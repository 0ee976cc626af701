//! Adapter implementations for the registry store port.

mod memory;

pub use memory::InMemoryRegistryStore;
