//! Client failure classification checked against a mocked peer.

use super::bridge_tests::{fast_settings, name};
use crate::agent_bridge::domain::{AgentCard, AgentDeclaration, AgentSkill};
use crate::agent_bridge::ports::{AgentClientError, MockAgentClient};
use crate::agent_bridge::services::{AgentBridge, AgentError};
use crate::catalog::services::CatalogAggregator;
use mockable::DefaultClock;
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const ENDPOINT: &str = "http://coder:9200";

fn bridge(client: MockAgentClient) -> (Arc<CatalogAggregator>, AgentBridge<DefaultClock>) {
    let catalog = Arc::new(CatalogAggregator::new());
    let bridge = AgentBridge::new(
        Arc::new(client),
        Arc::clone(&catalog),
        Arc::new(DefaultClock),
        fast_settings(),
    );
    (catalog, bridge)
}

fn coder_card() -> AgentCard {
    AgentCard::new("coder", "").with_skill(AgentSkill::new("review", "Reviews code"))
}

#[rstest]
#[case::rpc(AgentClientError::Rpc { code: -32603, message: "boom".to_owned() })]
#[case::status(AgentClientError::Status { status: 500, body: "oops".to_owned() })]
#[case::timeout(AgentClientError::timeout("message/send", Duration::from_secs(1)))]
#[tokio::test(flavor = "multi_thread")]
async fn call_level_failures_keep_the_agent_available(#[case] failure: AgentClientError) {
    let mut client = MockAgentClient::new();
    client
        .expect_fetch_card()
        .returning(|_, _| Ok(coder_card()));
    client
        .expect_send_message()
        .withf(|peer, params, _| {
            peer.url == ENDPOINT && params.message.metadata.get("skill_id").map(String::as_str) == Some("review")
        })
        .times(1)
        .returning(move |_, _, _| Err(failure.clone()));
    let (catalog, agents) = bridge(client);
    agents
        .register(AgentDeclaration::remote(name("coder"), ENDPOINT))
        .await
        .expect("register");

    let error = agents
        .invoke(&name("coder"), "review", json!({"message": "diff"}), Duration::from_secs(1))
        .await
        .expect_err("call fails");

    assert!(matches!(error, AgentError::Invocation { .. }));
    assert!(catalog.snapshot().contains("coder__review"));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_cards_leave_the_agent_unavailable() {
    let mut client = MockAgentClient::new();
    client.expect_fetch_card().returning(|_, _| {
        Ok(AgentCard::new("coder", "")
            .with_skill(AgentSkill::new("review", ""))
            .with_skill(AgentSkill::new("review", "")))
    });
    client.expect_send_message().never();
    let (catalog, agents) = bridge(client);

    let status = agents
        .register(AgentDeclaration::remote(name("coder"), ENDPOINT))
        .await
        .expect("register");
    let error = agents
        .invoke(&name("coder"), "review", json!({}), Duration::from_secs(1))
        .await
        .expect_err("agent is unavailable");

    assert!(!status.available);
    assert!(
        status
            .last_error
            .is_some_and(|reason| reason.contains("more than once"))
    );
    assert!(catalog.snapshot().is_empty());
    assert!(matches!(error, AgentError::Unavailable { .. }));
}
