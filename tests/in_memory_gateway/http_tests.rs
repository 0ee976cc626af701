//! The HTTP surface served on a loopback listener.

use super::helpers::{Fixture, fast_settings, fixture, provider};
use gatehouse::agent_bridge::adapters::InMemoryTaskStore;
use gatehouse::agent_bridge::domain::AgentCard;
use gatehouse::agent_bridge::services::AgentHost;
use gatehouse::catalog::domain::AccessPolicy;
use gatehouse::gateway::adapters::{AGENT_HEADER, HttpFront, SESSION_HEADER, SessionManager, serve};
use mockable::DefaultClock;
use rstest::rstest;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

fn front(fixture: &Fixture, address: &str) -> HttpFront<DefaultClock> {
    let clock = Arc::new(DefaultClock);
    let settings = fast_settings();
    HttpFront::new(
        fixture.gateway.clone(),
        AgentHost::new(
            Arc::new(InMemoryTaskStore::new()),
            Arc::clone(&clock),
            &format!("http://{address}"),
        ),
        SessionManager::new(clock, settings.max_sessions),
        &settings,
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn served_gateway_answers_and_shuts_down() {
    let fixture = fixture().await;
    fixture
        .gateway
        .catalog()
        .set_access_policy(provider("auditor"), AccessPolicy::default())
        .expect("policy stored");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("bound address");
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, front(&fixture, &address.to_string()), async move {
        stopped.await.unwrap_or_default();
    }));
    let client = reqwest::Client::new();
    let call = json!({"jsonrpc": "2.0", "id": 9, "method": "tools/call",
                      "params": {"name": "registry__add-and-echo",
                                 "arguments": {"a": "5", "b": "6"}}});

    let answered: Value = client
        .post(format!("http://{address}/mcp"))
        .json(&call)
        .send()
        .await
        .expect("request sent")
        .json()
        .await
        .expect("JSON answer");
    let denied: Value = client
        .post(format!("http://{address}/mcp"))
        .header(AGENT_HEADER, "auditor")
        .json(&call)
        .send()
        .await
        .expect("request sent")
        .json()
        .await
        .expect("JSON answer");
    let status = client
        .get(format!("http://{address}/api/status"))
        .send()
        .await
        .expect("request sent");

    assert_eq!(answered["result"]["content"][0]["text"], "11");
    assert_eq!(denied["error"]["data"]["kind"], "access_denied");
    assert!(status.status().is_success());

    stop.send(()).expect("server still running");
    server
        .await
        .expect("server task joins")
        .expect("server stops cleanly");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn served_gateway_hosts_agents_and_sessions() {
    let fixture = fixture().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("bound address");
    let front = front(&fixture, &address.to_string());
    front
        .agents()
        .host(&provider("helper"), AgentCard::new("Helper", ""), None)
        .await
        .expect("host");
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, front.clone(), async move {
        stopped.await.unwrap_or_default();
    }));
    let client = reqwest::Client::new();

    let initialized = client
        .post(format!("http://{address}/mcp"))
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}))
        .send()
        .await
        .expect("request sent");
    let session = initialized
        .headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let cards: Value = client
        .get(format!("http://{address}/.well-known/agent.json"))
        .send()
        .await
        .expect("request sent")
        .json()
        .await
        .expect("JSON answer");
    let closed = client
        .delete(format!("http://{address}/mcp"))
        .header(SESSION_HEADER, session.clone().unwrap_or_default())
        .send()
        .await
        .expect("request sent");

    assert!(session.is_some());
    assert_eq!(
        cards["agents"][0]["url"],
        format!("http://{address}/a2a/helper")
    );
    assert_eq!(closed.status(), reqwest::StatusCode::NO_CONTENT);
    assert_eq!(front.sessions().count(), 0);

    stop.send(()).expect("server still running");
    server
        .await
        .expect("server task joins")
        .expect("server stops cleanly");
}
