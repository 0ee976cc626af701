//! When steps for skill execution BDD scenarios.

use super::world::{SkillWorld, run_async};
use gatehouse::registry::domain::ItemKind;
use rstest_bdd_macros::when;
use serde_json::{Map, Value, json};

fn call(world: &mut SkillWorld, tool: &str, arguments: Value) {
    let result = run_async(world.gateway.call_tool(None, tool, arguments.clone()));
    if result.is_ok() {
        let skill = tool.trim_start_matches("registry__");
        let inputs = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        world.last_step_count = run_async(world.gateway.execute_skill(None, skill, &inputs))
            .ok()
            .map(|run| run.steps.len());
    }
    world.last_call = Some(result);
}

#[when(r#"the skill tool "{tool}" is called with a "{first}" and b "{second}""#)]
fn call_with_both(world: &mut SkillWorld, tool: String, first: String, second: String) {
    call(world, &tool, json!({"a": first, "b": second}));
}

#[when(r#"the skill tool "{tool}" is called with only a "{first}""#)]
fn call_with_first(world: &mut SkillWorld, tool: String, first: String) {
    call(world, &tool, json!({"a": first}));
}

#[when(r#"the skill "{skill}" is activated"#)]
fn activate(world: &mut SkillWorld, skill: String) {
    world.last_activation = Some(run_async(
        world.gateway.registry().activate(ItemKind::Skill, &skill),
    ));
}
