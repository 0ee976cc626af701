//! Catalog updates observed as providers and skills come and go.

use super::helpers::{
    Fixture, RESEARCH, add_backend, empty_fixture, fixture, load_and_activate, object, provider,
    script_calc, script_echo,
};
use gatehouse::backend::domain::{BackendDeclaration, TransportConfig};
use gatehouse::gateway::services::Gateway;
use gatehouse::registry::domain::{ItemKind, RegistryItem};
use gatehouse::registry::services::RegistryError;
use mockable::DefaultClock;
use rstest::rstest;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const READERS: usize = 8;

fn names(fixture: &Fixture) -> Vec<String> {
    fixture
        .gateway
        .catalog()
        .snapshot()
        .entries()
        .iter()
        .map(|entry| entry.name().to_string())
        .collect()
}

/// One catalog read: the tool names seen and whether the read began after
/// the disconnect had returned.
type Observation = (BTreeSet<String>, bool);

fn read_catalog(gateway: &Gateway<DefaultClock>, through_snapshot: bool) -> BTreeSet<String> {
    if through_snapshot {
        return gateway
            .catalog()
            .snapshot()
            .entries()
            .iter()
            .map(|entry| entry.name().to_string())
            .collect();
    }
    gateway
        .list_tools(None)
        .expect("catalog readable")
        .iter()
        .map(|tool| tool.name().to_owned())
        .collect()
}

fn tool_set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| (*name).to_owned()).collect()
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_never_see_a_half_withdrawn_backend() {
    let fixture = empty_fixture();
    script_calc(&fixture.transport);
    script_echo(&fixture.transport, "other");
    add_backend(&fixture.gateway, "calc").await;
    add_backend(&fixture.gateway, "other").await;
    let before = tool_set(&["calc__add", "calc__echo", "other__echo"]);
    let after = tool_set(&["calc__add", "calc__echo"]);
    let returned = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..READERS)
        .map(|reader| {
            let gateway = fixture.gateway.clone();
            let returned = Arc::clone(&returned);
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                let mut seen: Vec<Observation> = Vec::new();
                let mut round = reader;
                while !finished.load(Ordering::Acquire) {
                    let late = returned.load(Ordering::Acquire);
                    seen.push((read_catalog(&gateway, round % 2 == 0), late));
                    round = round.wrapping_add(1);
                    tokio::task::yield_now().await;
                }
                seen
            })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(20)).await;
    fixture
        .gateway
        .backends()
        .disconnect(&provider("other"))
        .await
        .expect("disconnect");
    returned.store(true, Ordering::Release);
    tokio::time::sleep(Duration::from_millis(20)).await;
    finished.store(true, Ordering::Release);

    for reader in readers {
        let seen = reader.await.expect("reader finished");
        assert!(!seen.is_empty());
        let mut withdrawn = false;
        for (names, late) in seen {
            assert!(
                names == before || names == after,
                "partial catalog observed: {names:?}"
            );
            if late {
                assert_eq!(names, after, "read after disconnect still lists 'other'");
            }
            withdrawn |= names == after;
            assert!(!(withdrawn && names == before), "catalog went back in time");
        }
    }
    assert_eq!(read_catalog(&fixture.gateway, true), after);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn subscribers_see_each_provider_arrive() {
    let fixture = empty_fixture();
    script_calc(&fixture.transport);
    let mut changes = fixture.gateway.catalog().subscribe();
    let before = changes.borrow_and_update().revision();

    fixture
        .gateway
        .backends()
        .add(BackendDeclaration::new(
            provider("calc"),
            TransportConfig::local_process("calc-server").expect("valid transport"),
        ))
        .await
        .expect("add");

    tokio::time::timeout(Duration::from_secs(1), changes.changed())
        .await
        .expect("change announced in time")
        .expect("aggregator alive");
    assert!(changes.borrow().revision() > before);
    assert_eq!(names(&fixture), ["calc__add", "calc__echo"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn skills_cannot_activate_before_their_tools_exist() {
    let fixture = empty_fixture();
    let document = json!({
        "name": "double",
        "inputs": [{"name": "n", "required": true}],
        "steps": [{"tool": "calc__add", "arguments": {"a": "{{input.n}}", "b": "{{input.n}}"}}]
    });
    let item = RegistryItem::from_document(ItemKind::Skill, document)
        .expect("valid definition");
    fixture.gateway.registry().load(item).await.expect("load");

    let result = fixture
        .gateway
        .registry()
        .activate(ItemKind::Skill, "double")
        .await;

    assert!(matches!(result, Err(RegistryError::UnresolvedTool { .. })));
    assert!(names(&fixture).is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn removed_agents_leave_the_catalog() {
    let fixture = fixture().await;

    fixture
        .gateway
        .agents()
        .remove(&provider("research"))
        .await
        .expect("remove");

    assert!(!names(&fixture).iter().any(|name| name.starts_with("research__")));
    assert!(fixture.agents.received(RESEARCH).is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn torn_down_backends_free_their_name() {
    let fixture = fixture().await;

    fixture
        .gateway
        .backends()
        .tear_down(&provider("calc"))
        .await
        .expect("tear down");
    let readded = fixture
        .gateway
        .backends()
        .add(BackendDeclaration::new(
            provider("calc"),
            TransportConfig::local_process("calc-server").expect("valid transport"),
        ))
        .await;

    assert!(readded.is_ok());
    assert!(names(&fixture).contains(&"calc__add".to_owned()));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn prompts_follow_their_lifecycle() {
    let fixture = fixture().await;
    load_and_activate(
        &fixture.gateway,
        ItemKind::Prompt,
        json!({
            "name": "brief",
            "description": "Briefs a reviewer",
            "template": "Review {{topic}} carefully.",
            "arguments": [{"name": "topic", "required": true}]
        }),
    )
    .await;

    let (_, text) = fixture
        .gateway
        .render_prompt("brief", &object(json!({"topic": "the catalog"})))
        .await
        .expect("render");
    fixture
        .gateway
        .registry()
        .disable(ItemKind::Prompt, "brief")
        .await
        .expect("disable");

    assert_eq!(text, "Review the catalog carefully.");
    assert!(fixture.gateway.list_prompts().await.is_empty());
}
