//! Shared world state for skill execution BDD scenarios.

use gatehouse::agent_bridge::adapters::InMemoryAgentClient;
use gatehouse::agent_bridge::services::AgentBridge;
use gatehouse::backend::adapters::InMemoryTransport;
use gatehouse::backend::services::BackendRegistry;
use gatehouse::catalog::domain::ToolOutput;
use gatehouse::catalog::services::CatalogAggregator;
use gatehouse::error::GatewayError;
use gatehouse::gateway::services::Gateway;
use gatehouse::registry::adapters::InMemoryRegistryStore;
use gatehouse::registry::domain::RegistryItem;
use gatehouse::registry::services::{RegistryError, RegistryService};
use gatehouse::settings::GatewaySettings;
use mockable::DefaultClock;
use rstest::fixture;
use std::sync::Arc;
use std::time::Duration;

/// Scenario world for skill execution behaviour tests.
pub struct SkillWorld {
    /// Scripted backend transport.
    pub transport: InMemoryTransport,
    /// Gateway under test.
    pub gateway: Gateway<DefaultClock>,
    /// Result of the last tool call.
    pub last_call: Option<Result<ToolOutput, GatewayError>>,
    /// Step count of the last successful preview run.
    pub last_step_count: Option<usize>,
    /// Result of the last activation attempt.
    pub last_activation: Option<Result<RegistryItem, RegistryError>>,
}

impl SkillWorld {
    /// Creates a world with a gateway over empty in-memory adapters.
    #[must_use]
    pub fn new() -> Self {
        let settings = GatewaySettings {
            invocation_timeout: Duration::from_secs(2),
            ..GatewaySettings::default()
        };
        let transport = InMemoryTransport::new();
        let catalog = Arc::new(CatalogAggregator::new());
        let clock = Arc::new(DefaultClock);
        let backends = BackendRegistry::new(
            Arc::new(transport.clone()),
            Arc::clone(&catalog),
            Arc::clone(&clock),
            settings.clone(),
        );
        let agents = AgentBridge::new(
            Arc::new(InMemoryAgentClient::new()),
            Arc::clone(&catalog),
            clock,
            settings.clone(),
        );
        let registry = Arc::new(RegistryService::new(
            Arc::new(InMemoryRegistryStore::new()),
            Arc::clone(&catalog),
        ));
        Self {
            transport,
            gateway: Gateway::new(catalog, backends, agents, registry, settings),
            last_call: None,
            last_step_count: None,
            last_activation: None,
        }
    }
}

impl Default for SkillWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> SkillWorld {
    SkillWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
