//! HTTP surface driven through the router without a listener.

use super::router_tests::{Harness, harness, name};
use crate::agent_bridge::adapters::InMemoryTaskStore;
use crate::agent_bridge::domain::{AgentCard, AgentSkill};
use crate::agent_bridge::services::{AgentHost, TASK_NOT_FOUND};
use crate::catalog::domain::AccessPolicy;
use crate::gateway::adapters::{
    AGENT_HEADER, HttpFront, MAX_AGENT_REQUEST_BYTES, SESSION_HEADER, SessionManager, router,
};
use crate::settings::GatewaySettings;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use mockable::DefaultClock;
use rstest::rstest;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn front(harness: &Harness) -> HttpFront<DefaultClock> {
    let clock = Arc::new(DefaultClock);
    let settings = GatewaySettings::default();
    HttpFront::new(
        harness.gateway.clone(),
        AgentHost::new(
            Arc::new(InMemoryTaskStore::new()),
            Arc::clone(&clock),
            "http://gateway.test",
        ),
        SessionManager::new(clock, settings.max_sessions),
        &settings,
    )
}

fn app(harness: &Harness) -> Router {
    router(front(harness))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = exchange(app, request).await;
    (status, body)
}

async fn exchange(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON body")
    };
    (status, headers, body)
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

fn with_session(mut request: Request<Body>, id: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert(SESSION_HEADER, id.parse().expect("valid header value"));
    request
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn protocol_endpoint_answers_requests() {
    let harness = harness().await;

    let (status, body) = send(
        app(&harness),
        post(
            "/mcp",
            &json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                    "params": {"name": "calc__add", "arguments": {"a": 20, "b": 22}}}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["content"][0]["text"], "42");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn protocol_endpoint_accepts_notifications() {
    let harness = harness().await;

    let (status, body) = send(
        app(&harness),
        post("/mcp", &json!({"jsonrpc": "2.0", "method": "notifications/initialized"})),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, Value::Null);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn caller_header_selects_the_access_policy() {
    let harness = harness().await;
    let planner = name("planner");
    harness
        .gateway
        .catalog()
        .set_access_policy(planner, AccessPolicy::default())
        .expect("policy stored");
    let mut request = post(
        "/mcp",
        &json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
    );
    request.headers_mut().insert(
        AGENT_HEADER,
        "planner".parse().expect("valid header value"),
    );

    let (status, body) = send(app(&harness), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["tools"], json!([]));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_caller_header_is_a_bad_request() {
    let harness = harness().await;
    let mut request = post("/mcp", &json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}));
    request.headers_mut().insert(
        AGENT_HEADER,
        "has__separator".parse().expect("valid header value"),
    );

    let (status, _) = send(app(&harness), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn status_endpoint_reports_components() {
    let harness = harness().await;

    let (status, body) = send(app(&harness), get("/api/status")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tools"], 4);
    assert_eq!(body["backends"][0]["name"], "calc");
    assert_eq!(body["agents"][0]["name"], "research");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn prompts_are_managed_over_http() {
    let harness = harness().await;
    let definition = json!({
        "name": "farewell",
        "description": "Says goodbye",
        "template": "Goodbye {{name}}.",
        "arguments": [{"name": "name", "required": true}]
    });

    let (loaded, item) = send(app(&harness), post("/api/registry/prompts", &definition)).await;
    let (rendered, text) = send(
        app(&harness),
        post(
            "/api/registry/prompts/farewell/render",
            &json!({"arguments": {"name": "Ada"}}),
        ),
    )
    .await;
    let (activated, _) = send(
        app(&harness),
        post("/api/registry/prompts/farewell/activate", &json!({})),
    )
    .await;
    let (_, listed) = send(app(&harness), get("/api/registry/prompts")).await;

    assert_eq!(loaded, StatusCode::CREATED);
    assert_eq!(item["name"], "farewell");
    assert_eq!(rendered, StatusCode::OK);
    assert_eq!(text["text"], "Goodbye Ada.");
    assert_eq!(activated, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(2));
    assert_eq!(harness.gateway.list_prompts().await.len(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn skills_execute_over_http() {
    let harness = harness().await;

    let (status, run) = send(
        app(&harness),
        post(
            "/api/registry/skills/add-and-echo/execute",
            &json!({"inputs": {"a": "7", "b": "8"}}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["skill"], "add-and-echo");
    assert_eq!(run["steps"].as_array().map(Vec::len), Some(2));
    assert_eq!(run["final"]["content"][0]["text"], "15");
}

#[rstest]
#[case(get("/api/registry/widgets"), StatusCode::NOT_FOUND)]
#[case(get("/api/registry/skills/unknown"), StatusCode::NOT_FOUND)]
#[case(post("/api/registry/skills/add-and-echo/render", &json!({})), StatusCode::NOT_FOUND)]
#[case(post("/api/registry/skills/add-and-echo/execute", &json!({"inputs": {"a": "1"}})), StatusCode::BAD_REQUEST)]
#[tokio::test(flavor = "multi_thread")]
async fn management_errors_map_to_statuses(#[case] request: Request<Body>, #[case] expected: StatusCode) {
    let harness = harness().await;

    let (status, body) = send(app(&harness), request).await;

    assert_eq!(status, expected);
    assert!(body["error"]["kind"].is_string());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn initialize_opens_a_session_until_deleted() {
    let harness = harness().await;
    let front = front(&harness);
    let initialize = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize",
                            "params": {"protocolVersion": "2025-03-26", "capabilities": {},
                                       "clientInfo": {"name": "test", "version": "1"}}});

    let (status, headers, _) = exchange(router(front.clone()), post("/mcp", &initialize)).await;
    let id = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .expect("session header")
        .to_owned();
    let ping = json!({"jsonrpc": "2.0", "id": 2, "method": "ping"});
    let (pinged, _) = send(router(front.clone()), with_session(post("/mcp", &ping), &id)).await;
    let (closed, _) = send(router(front.clone()), with_session(delete("/mcp"), &id)).await;
    let (stale, _) = send(router(front.clone()), with_session(post("/mcp", &ping), &id)).await;
    let (gone, _) = send(router(front.clone()), with_session(delete("/mcp"), &id)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(id.len(), 32);
    assert_eq!(pinged, StatusCode::OK);
    assert_eq!(closed, StatusCode::NO_CONTENT);
    assert_eq!(stale, StatusCode::NOT_FOUND);
    assert_eq!(gone, StatusCode::NOT_FOUND);
    assert_eq!(front.sessions().count(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn requests_without_a_session_are_still_served() {
    let harness = harness().await;
    let front = front(&harness);

    let (status, headers, _) = exchange(
        router(front.clone()),
        post("/mcp", &json!({"jsonrpc": "2.0", "id": 4, "method": "ping"})),
    )
    .await;
    let (missing, _) = send(router(front.clone()), delete("/mcp")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(SESSION_HEADER).is_none());
    assert_eq!(missing, StatusCode::BAD_REQUEST);
    assert_eq!(front.sessions().count(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn hosted_agents_are_discoverable_and_answer_messages() {
    let harness = harness().await;
    let front = front(&harness);
    front
        .agents()
        .host(
            &name("helper"),
            AgentCard::new("Helper", "").with_skill(AgentSkill::new("help", "Helps")),
            None,
        )
        .await
        .expect("host");
    let message = json!({"jsonrpc": "2.0", "id": 5, "method": "message/send",
                         "params": {"message": {"role": "user",
                                                "parts": [{"type": "text", "text": "hi"}]}}});

    let (_, cards) = send(router(front.clone()), get("/.well-known/agent.json")).await;
    let (_, summaries) = send(router(front.clone()), get("/a2a")).await;
    let (found, card) = send(router(front.clone()), get("/a2a/helper")).await;
    let (missing, _) = send(router(front.clone()), get("/a2a/nobody")).await;
    let (_, sent) = send(router(front.clone()), post("/a2a/helper", &message)).await;
    let (_, unknown) = send(
        router(front.clone()),
        post(
            "/a2a/helper",
            &json!({"jsonrpc": "2.0", "id": 6, "method": "tasks/get", "params": {"id": "nope"}}),
        ),
    )
    .await;

    assert_eq!(cards["agents"][0]["url"], "http://gateway.test/a2a/helper");
    assert_eq!(summaries, json!([{"name": "helper", "url": "http://gateway.test/a2a/helper", "skillCount": 1}]));
    assert_eq!(found, StatusCode::OK);
    assert_eq!(card["name"], "Helper");
    assert_eq!(missing, StatusCode::NOT_FOUND);
    assert_eq!(sent["result"]["task"]["status"]["state"], "completed");
    assert_eq!(unknown["error"]["code"], TASK_NOT_FOUND);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn oversized_agent_requests_are_refused() {
    let harness = harness().await;
    let front = front(&harness);
    front
        .agents()
        .host(&name("helper"), AgentCard::new("Helper", ""), None)
        .await
        .expect("host");
    let padding = "x".repeat(MAX_AGENT_REQUEST_BYTES);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/a2a/helper")
        .header("content-type", "application/json")
        .body(Body::from(format!("{{\"padding\": \"{padding}\"}}")))
        .expect("valid request");

    let response = router(front).oneshot(request).await.expect("router is infallible");

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
