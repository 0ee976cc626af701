//! Tool calls routed across backends, agents and registry skills.

use super::helpers::{
    RESEARCH, add_backend, fixture, load_and_activate, object, provider, script_echo,
};
use gatehouse::catalog::domain::{AccessPolicy, ToolFilter};
use gatehouse::registry::domain::ItemKind;
use gatehouse::error::GatewayError;
use gatehouse::workflow::domain::CallContext;
use rstest::rstest;
use serde_json::json;
use std::time::{Duration, Instant};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn one_catalog_spans_every_provider() {
    let fixture = fixture().await;

    let names: Vec<String> = fixture
        .gateway
        .list_tools(None)
        .expect("catalog readable")
        .iter()
        .map(|tool| tool.name().to_owned())
        .collect();

    assert_eq!(
        names,
        [
            "calc__add",
            "calc__echo",
            "registry__add-and-echo",
            "research__summarize"
        ]
    );
}

#[rstest]
#[case("calc__echo", json!({"text": "hello"}), "hello")]
#[case("research__summarize", json!({"message": "a long report"}), "summary: a long report")]
#[case("registry__add-and-echo", json!({"a": "10", "b": "20"}), "30")]
#[tokio::test(flavor = "multi_thread")]
async fn calls_reach_their_provider(
    #[case] tool: &str,
    #[case] arguments: serde_json::Value,
    #[case] expected: &str,
) {
    let fixture = fixture().await;

    let output = fixture
        .gateway
        .call_tool(None, tool, arguments)
        .await
        .expect("call succeeds");

    assert!(!output.is_error);
    assert!(output.joined_text().contains(expected));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn skill_runs_report_each_step() {
    let fixture = fixture().await;

    let run = fixture
        .gateway
        .execute_skill(None, "add-and-echo", &object(json!({"a": 2, "b": 40})))
        .await
        .expect("run succeeds");

    let results: Vec<&str> = run.steps.iter().map(|step| step.result.as_str()).collect();
    assert_eq!(results, ["42", "42"]);
    assert_eq!(run.final_text(), "42");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn backend_loss_fails_the_step_and_hides_its_tools() {
    let fixture = fixture().await;
    fixture.transport.set_reachable(&provider("calc"), false);

    let result = fixture
        .gateway
        .call_tool(None, "registry__add-and-echo", json!({"a": "1", "b": "2"}))
        .await;

    match result {
        Err(GatewayError::Invocation { provider, tool, step, .. }) => {
            assert_eq!((provider.as_str(), tool.as_str(), step), ("calc", "add", Some(1)));
        }
        other => panic!("expected a failure at step 1, got {other:?}"),
    }
    assert!(!fixture.gateway.catalog().snapshot().contains("calc__add"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn provider_gone_after_activation_fails_its_step() {
    let fixture = fixture().await;
    script_echo(&fixture.transport, "other");
    add_backend(&fixture.gateway, "other").await;
    load_and_activate(
        &fixture.gateway,
        ItemKind::Skill,
        json!({
            "name": "cross",
            "description": "Adds on calc and echoes on another backend",
            "inputs": [{"name": "a", "required": true}, {"name": "b", "required": true}],
            "steps": [
                {"tool": "calc__add", "arguments": {"a": "{{input.a}}", "b": "{{input.b}}"}},
                {"tool": "other__echo", "arguments": {"text": "{{step1.result}}"}}
            ]
        }),
    )
    .await;
    fixture
        .gateway
        .backends()
        .disconnect(&provider("other"))
        .await
        .expect("disconnect");

    let error = fixture
        .gateway
        .call_tool(None, "registry__cross", json!({"a": "1", "b": "2"}))
        .await
        .expect_err("step 2 has no provider");

    assert_eq!(
        error.detail(),
        json!({"kind": "invocation_error", "provider": "other", "tool": "echo", "step": 2})
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn one_deadline_covers_every_skill_step() {
    let fixture = fixture().await;
    fixture
        .transport
        .set_latency(&provider("calc"), Duration::from_millis(400));
    let context = CallContext::new(None, Duration::from_millis(500));
    let started = Instant::now();

    let error = fixture
        .gateway
        .call_tool_in(&context, "registry__add-and-echo", json!({"a": "1", "b": "2"}))
        .await
        .expect_err("second step runs out of time");

    assert!(started.elapsed() < Duration::from_millis(750));
    assert_eq!(
        error.detail(),
        json!({"kind": "invocation_error", "provider": "calc", "tool": "echo", "step": 2})
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn caller_timeout_bounds_agent_task_polling() {
    let fixture = fixture().await;
    fixture.agents.set_pending_polls(RESEARCH, 60);
    let context = CallContext::new(None, Duration::from_millis(50));
    let started = Instant::now();

    let error = fixture
        .gateway
        .call_tool_in(&context, "research__summarize", json!({"message": "slow"}))
        .await
        .expect_err("caller gives up before the task finishes");

    assert!(started.elapsed() < Duration::from_millis(300));
    assert!(matches!(error, GatewayError::Invocation { .. }));
    assert!(error.to_string().contains("timed out"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unreachable_agent_fails_without_touching_backends() {
    let fixture = fixture().await;
    fixture.agents.set_reachable(RESEARCH, false);

    let failed = fixture
        .gateway
        .call_tool(None, "research__summarize", json!({"message": "x"}))
        .await;
    let still_working = fixture
        .gateway
        .call_tool(None, "calc__add", json!({"a": 1, "b": 1}))
        .await
        .expect("backend unaffected");

    assert!(matches!(failed, Err(GatewayError::BackendUnavailable { .. })));
    assert_eq!(still_working.joined_text(), "2");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn policies_scope_each_caller() {
    let fixture = fixture().await;
    let catalog = fixture.gateway.catalog();
    catalog
        .set_access_policy(
            provider("writer"),
            AccessPolicy::default().grant(provider("research"), ToolFilter::unrestricted()),
        )
        .expect("policy stored");
    catalog
        .set_access_policy(
            provider("counter"),
            AccessPolicy::default().grant(
                provider("calc"),
                ToolFilter::allow(["add"]).expect("valid filter"),
            ),
        )
        .expect("policy stored");

    let writer = fixture
        .gateway
        .call_tool(Some(provider("writer")), "calc__add", json!({"a": 1, "b": 1}))
        .await;
    let counter = fixture
        .gateway
        .call_tool(Some(provider("counter")), "calc__add", json!({"a": 1, "b": 1}))
        .await
        .expect("granted");

    assert!(matches!(writer, Err(GatewayError::AccessDenied { .. })));
    assert_eq!(counter.joined_text(), "2");
    assert_eq!(
        fixture
            .gateway
            .list_tools(Some(&provider("counter")))
            .expect("catalog readable")
            .len(),
        1
    );
}
