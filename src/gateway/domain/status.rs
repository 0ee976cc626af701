//! Aggregate health snapshot returned by `gateway/status`.

use super::ServerInfo;
use crate::agent_bridge::services::AgentStatus;
use crate::backend::services::BackendStatus;
use serde::Serialize;

/// Point-in-time view of every provider the gateway fronts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayStatus {
    /// Gateway identity.
    pub server: ServerInfo,
    /// Revision of the catalog snapshot.
    pub catalog_revision: u64,
    /// Number of tools in the unfiltered catalog.
    pub tools: usize,
    /// Backend statuses ordered by name.
    pub backends: Vec<BackendStatus>,
    /// Agent statuses ordered by name.
    pub agents: Vec<AgentStatus>,
    /// Number of active prompts.
    pub active_prompts: usize,
    /// Number of active skills.
    pub active_skills: usize,
}

impl GatewayStatus {
    /// Returns whether every backend is initialized and every agent
    /// available.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.backends
            .iter()
            .all(|backend| backend.state.is_catalog_visible())
            && self.agents.iter().all(|agent| agent.available)
    }
}
