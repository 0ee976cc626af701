//! Gatehouse: a tool gateway aggregating tool backends and agent peers.
//!
//! Backends speaking the line-delimited or HTTP JSON-RPC tool protocol, A2A
//! agent peers and registry-defined skills all contribute tools to one
//! namespaced catalog (`provider__tool`). Callers see the catalog through
//! their access policy and invoke tools through a single JSON-RPC surface.
//!
//! # Architecture
//!
//! Each component follows hexagonal architecture principles:
//!
//! - **Domain**: Pure types, validation and state machines
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports, including in-memory
//!   adapters for deterministic tests
//! - **Services**: Orchestration over ports
//!
//! # Modules
//!
//! - [`catalog`]: Namespaced tool catalog, filters and access policies
//! - [`backend`]: Transports and the backend connection lifecycle
//! - [`agent_bridge`]: A2A agent discovery, invocation and hosting
//! - [`registry`]: Skill and prompt definitions with their lifecycle
//! - [`workflow`]: Sequential skill execution
//! - [`gateway`]: Routing and the client-facing protocol and HTTP surfaces

pub mod agent_bridge;
pub mod backend;
pub mod catalog;
pub mod error;
pub mod gateway;
pub mod jsonrpc;
pub mod registry;
pub mod settings;
pub mod shell;
pub mod workflow;
