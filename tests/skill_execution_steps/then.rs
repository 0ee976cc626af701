//! Then steps for skill execution BDD scenarios.

use super::world::SkillWorld;
use gatehouse::catalog::domain::ToolOutput;
use gatehouse::error::GatewayError;
use gatehouse::registry::services::RegistryError;
use rstest_bdd_macros::then;

fn last_call(world: &SkillWorld) -> Result<&Result<ToolOutput, GatewayError>, eyre::Report> {
    world
        .last_call
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing call result in scenario world"))
}

#[then(r#"the call returns the text "{expected}""#)]
fn call_returns_text(world: &SkillWorld, expected: String) -> Result<(), eyre::Report> {
    match last_call(world)? {
        Ok(output) if output.joined_text() == expected => Ok(()),
        other => Err(eyre::eyre!("expected text '{expected}', got {other:?}")),
    }
}

#[then("the run recorded {count:usize} steps")]
fn run_recorded_steps(world: &SkillWorld, count: usize) -> Result<(), eyre::Report> {
    match world.last_step_count {
        Some(recorded) if recorded == count => Ok(()),
        other => Err(eyre::eyre!("expected {count} steps, got {other:?}")),
    }
}

#[then("the call fails with a configuration error")]
fn call_fails_with_configuration(world: &SkillWorld) -> Result<(), eyre::Report> {
    let result = last_call(world)?;
    if !matches!(result, Err(GatewayError::Configuration(_))) {
        return Err(eyre::eyre!("expected configuration error, got {result:?}"));
    }
    Ok(())
}

#[then(r#"the call fails at step {step:usize} of backend "{backend}""#)]
fn call_fails_at_step(world: &SkillWorld, step: usize, backend: String) -> Result<(), eyre::Report> {
    match last_call(world)? {
        Err(GatewayError::Invocation {
            provider,
            step: Some(failed),
            ..
        }) if *provider == backend && *failed == step => Ok(()),
        other => Err(eyre::eyre!(
            "expected invocation error at step {step} of '{backend}', got {other:?}"
        )),
    }
}

#[then("activation fails with an unresolved tool error")]
fn activation_fails(world: &SkillWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_activation
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing activation result in scenario world"))?;
    if !matches!(result, Err(RegistryError::UnresolvedTool { .. })) {
        return Err(eyre::eyre!("expected unresolved tool error, got {result:?}"));
    }
    Ok(())
}

#[then(r#"the catalog does not contain "{tool}""#)]
fn catalog_lacks(world: &SkillWorld, tool: String) -> Result<(), eyre::Report> {
    if world.gateway.catalog().snapshot().contains(&tool) {
        return Err(eyre::eyre!("expected '{tool}' to be absent from the catalog"));
    }
    Ok(())
}
