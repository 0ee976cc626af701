//! Given steps for skill execution BDD scenarios.

use super::world::{SkillWorld, run_async};
use eyre::WrapErr;
use gatehouse::backend::domain::{BackendDeclaration, TransportConfig};
use gatehouse::catalog::domain::{InputSchema, ProviderName, ToolDefinition, ToolOutput};
use gatehouse::registry::domain::{ItemKind, RegistryItem, Skill, SkillStep};
use rstest_bdd_macros::given;
use serde_json::{Value, json};

fn integer(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::String(text)) => text.parse().unwrap_or_default(),
        Some(Value::Number(number)) => number.as_i64().unwrap_or_default(),
        _ => 0,
    }
}

fn calc() -> Result<ProviderName, eyre::Report> {
    ProviderName::new("calc").wrap_err("calc is a valid provider name")
}

#[given(r#"a calculator backend named "{name}""#)]
fn calculator_backend(world: &mut SkillWorld, name: String) -> Result<(), eyre::Report> {
    let backend = ProviderName::new(name).wrap_err("parse backend name")?;
    let tools = ["add", "echo"]
        .into_iter()
        .map(|tool| ToolDefinition::new(tool, "", InputSchema::object()))
        .collect::<Result<Vec<_>, _>>()
        .wrap_err("build calculator tools")?;
    world.transport.set_tools(&backend, tools);
    world.transport.on_call(&backend, "add", |arguments| {
        let sum = integer(arguments.get("a")).saturating_add(integer(arguments.get("b")));
        Ok(ToolOutput::text(sum.to_string()))
    });
    world.transport.on_call(&backend, "echo", |arguments| {
        Ok(ToolOutput::text(
            arguments
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        ))
    });
    let transport =
        TransportConfig::local_process("calc-server").wrap_err("build calculator transport")?;
    run_async(
        world
            .gateway
            .backends()
            .add(BackendDeclaration::new(backend, transport)),
    )
    .wrap_err("register calculator backend")?;
    Ok(())
}

#[given(r#"the active skill "{skill}" adding "{first}" and "{second}" then echoing the sum"#)]
fn active_adding_skill(
    world: &mut SkillWorld,
    skill: String,
    first: String,
    second: String,
) -> Result<(), eyre::Report> {
    let definition = Skill::new(
        skill.clone(),
        "Adds two numbers and echoes the sum",
        vec![
            SkillStep::new(
                "calc__add",
                json!({"a": format!("{{{{input.{first}}}}}"), "b": format!("{{{{input.{second}}}}}")}),
            ),
            SkillStep::new("calc__echo", json!({"text": "{{step1.result}}"})),
        ],
    )
    .with_input(first, true)
    .with_input(second, true);
    let registry = world.gateway.registry();
    run_async(registry.load(RegistryItem::Skill(definition))).wrap_err("load skill")?;
    run_async(registry.activate(ItemKind::Skill, &skill)).wrap_err("activate skill")?;
    Ok(())
}

#[given(r#"the backend tool "{tool}" starts failing"#)]
fn backend_tool_fails(world: &mut SkillWorld, tool: String) -> Result<(), eyre::Report> {
    let message = format!("{tool} is broken");
    world.transport.on_call(&calc()?, &tool, move |_| {
        Ok(ToolOutput::error(message.clone()))
    });
    Ok(())
}

#[given(r#"a draft skill "{skill}" calling "{tool}""#)]
fn draft_skill(world: &mut SkillWorld, skill: String, tool: String) -> Result<(), eyre::Report> {
    let definition = Skill::new(skill, "", vec![SkillStep::new(tool, json!({}))]);
    run_async(
        world
            .gateway
            .registry()
            .load(RegistryItem::Skill(definition)),
    )
    .wrap_err("load draft skill")?;
    Ok(())
}
