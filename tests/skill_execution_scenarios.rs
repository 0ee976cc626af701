//! Behaviour tests for registry skills executed through the gateway.

mod skill_execution_steps;

use rstest_bdd_macros::scenario;
use skill_execution_steps::world::{SkillWorld, world};

#[scenario(
    path = "tests/features/skill_execution.feature",
    name = "Run a two-step skill"
)]
#[tokio::test(flavor = "multi_thread")]
async fn run_two_step_skill(world: SkillWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/skill_execution.feature",
    name = "Reject a call missing a required input"
)]
#[tokio::test(flavor = "multi_thread")]
async fn reject_missing_input(world: SkillWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/skill_execution.feature",
    name = "Abort the run when a step fails"
)]
#[tokio::test(flavor = "multi_thread")]
async fn abort_on_failed_step(world: SkillWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/skill_execution.feature",
    name = "Refuse to activate a skill with an unknown tool"
)]
#[tokio::test(flavor = "multi_thread")]
async fn refuse_unknown_tool(world: SkillWorld) {
    let _ = world;
}
