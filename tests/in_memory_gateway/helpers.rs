//! Shared builders for in-memory gateway integration tests.

use gatehouse::agent_bridge::adapters::InMemoryAgentClient;
use gatehouse::agent_bridge::domain::{AgentCard, AgentDeclaration, AgentSkill};
use gatehouse::agent_bridge::services::AgentBridge;
use gatehouse::backend::adapters::InMemoryTransport;
use gatehouse::backend::domain::{BackendDeclaration, TransportConfig};
use gatehouse::backend::services::BackendRegistry;
use gatehouse::catalog::domain::{InputSchema, ProviderName, ToolDefinition, ToolOutput};
use gatehouse::catalog::services::CatalogAggregator;
use gatehouse::gateway::services::Gateway;
use gatehouse::registry::adapters::InMemoryRegistryStore;
use gatehouse::registry::domain::{ItemKind, RegistryItem};
use gatehouse::registry::services::RegistryService;
use gatehouse::settings::{BackoffSettings, GatewaySettings};
use mockable::DefaultClock;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;

/// Endpoint of the scripted research agent.
pub const RESEARCH: &str = "http://research.test";

/// Gateway plus handles on its scripted providers.
pub struct Fixture {
    /// Scripted backend transport.
    pub transport: InMemoryTransport,
    /// Scripted agent peers.
    pub agents: InMemoryAgentClient,
    /// Gateway under test.
    pub gateway: Gateway<DefaultClock>,
}

/// Parses a provider name.
///
/// # Panics
///
/// Panics when the name is invalid.
#[must_use]
pub fn provider(value: &str) -> ProviderName {
    ProviderName::new(value).expect("valid provider name")
}

/// Unwraps a JSON object literal.
#[must_use]
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Settings with short timeouts and quick reconnection.
#[must_use]
pub fn fast_settings() -> GatewaySettings {
    GatewaySettings {
        invocation_timeout: Duration::from_secs(2),
        handshake_timeout: Duration::from_secs(1),
        agent_poll_interval: Duration::from_millis(5),
        agent_task_deadline: Duration::from_millis(500),
        reconnect: BackoffSettings {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(40),
            multiplier: 2,
            max_attempts: None,
        },
        ..GatewaySettings::default()
    }
}

fn tool(name: &str) -> ToolDefinition {
    ToolDefinition::new(name, format!("{name} tool"), InputSchema::object()).expect("valid tool")
}

fn integer(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::String(text)) => text.parse().unwrap_or_default(),
        Some(Value::Number(number)) => number.as_i64().unwrap_or_default(),
        _ => 0,
    }
}

/// Scripts the `calc` backend with `add` and `echo`.
pub fn script_calc(transport: &InMemoryTransport) {
    let calc = provider("calc");
    transport.set_tools(&calc, vec![tool("add"), tool("echo")]);
    transport.on_call(&calc, "add", |arguments| {
        let sum = integer(arguments.get("a")).saturating_add(integer(arguments.get("b")));
        Ok(ToolOutput::text(sum.to_string()))
    });
    transport.on_call(&calc, "echo", |arguments| {
        Ok(ToolOutput::text(
            arguments
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        ))
    });
}

/// Scripts `backend` with a single `echo` tool.
pub fn script_echo(transport: &InMemoryTransport, backend: &str) {
    let name = provider(backend);
    transport.set_tools(&name, vec![tool("echo")]);
    transport.on_call(&name, "echo", |arguments| {
        Ok(ToolOutput::text(
            arguments
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        ))
    });
}

/// Adds an in-memory backend named `name`.
///
/// # Panics
///
/// Panics when the backend cannot be added.
pub async fn add_backend(gateway: &Gateway<DefaultClock>, name: &str) {
    gateway
        .backends()
        .add(BackendDeclaration::new(
            provider(name),
            TransportConfig::local_process(format!("{name}-server")).expect("valid transport"),
        ))
        .await
        .expect("backend connects");
}

/// Builds a gateway over fresh in-memory adapters with nothing registered.
#[must_use]
pub fn empty_fixture() -> Fixture {
    let transport = InMemoryTransport::new();
    let agents = InMemoryAgentClient::new();
    let catalog = Arc::new(CatalogAggregator::new());
    let clock = Arc::new(DefaultClock);
    let backends = BackendRegistry::new(
        Arc::new(transport.clone()),
        Arc::clone(&catalog),
        Arc::clone(&clock),
        fast_settings(),
    );
    let bridge = AgentBridge::new(
        Arc::new(agents.clone()),
        Arc::clone(&catalog),
        clock,
        fast_settings(),
    );
    let registry = Arc::new(RegistryService::new(
        Arc::new(InMemoryRegistryStore::new()),
        Arc::clone(&catalog),
    ));
    Fixture {
        transport,
        agents,
        gateway: Gateway::new(catalog, backends, bridge, registry, fast_settings()),
    }
}

/// Builds a gateway with the `calc` backend, the `research` agent and the
/// active `add-and-echo` skill.
pub async fn fixture() -> Fixture {
    let fixture = empty_fixture();
    script_calc(&fixture.transport);
    fixture.agents.set_card(
        RESEARCH,
        AgentCard::new("Research Agent", RESEARCH)
            .with_skill(AgentSkill::new("summarize", "Summarises text")),
    );
    fixture.agents.on_skill(RESEARCH, "summarize", |arguments| {
        arguments
            .get("message")
            .and_then(Value::as_str)
            .map(|text| format!("summary: {text}"))
            .ok_or_else(|| "message is required".to_owned())
    });
    add_backend(&fixture.gateway, "calc").await;
    fixture
        .gateway
        .agents()
        .register(AgentDeclaration::remote(provider("research"), RESEARCH))
        .await
        .expect("research registers");
    load_and_activate(
        &fixture.gateway,
        ItemKind::Skill,
        json!({
            "name": "add-and-echo",
            "description": "Adds two numbers and echoes the sum",
            "inputs": [{"name": "a", "required": true}, {"name": "b", "required": true}],
            "steps": [
                {"tool": "calc__add", "arguments": {"a": "{{input.a}}", "b": "{{input.b}}"}},
                {"tool": "calc__echo", "arguments": {"text": "{{step1.result}}"}}
            ]
        }),
    )
    .await;
    fixture
}

/// Loads a definition document and activates it.
///
/// # Panics
///
/// Panics when the document is invalid or activation fails.
pub async fn load_and_activate(gateway: &Gateway<DefaultClock>, kind: ItemKind, document: Value) {
    let item = RegistryItem::from_document(kind, document).expect("valid definition");
    let name = item.name().to_owned();
    gateway.registry().load(item).await.expect("load");
    gateway
        .registry()
        .activate(kind, &name)
        .await
        .expect("activate");
}
