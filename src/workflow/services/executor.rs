//! Step-by-step skill runner.

use crate::catalog::domain::{NamespacedToolName, ToolOutput};
use crate::error::GatewayError;
use crate::registry::domain::{
    BindingEnvironment, MAX_STEP_RESULT_BYTES, RegistryDomainError, Skill, SkillStep,
    TemplateError, render_arguments,
};
use crate::workflow::domain::{CallContext, SkillRun, StepResult, WorkflowError};
use crate::workflow::ports::ToolInvoker;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runs skills strictly in step order, aborting on the first failure.
///
/// The executor holds no per-run state, so one instance serves any number
/// of concurrent runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillExecutor {
    step_timeout: Duration,
}

impl SkillExecutor {
    /// Creates an executor capping every step at `step_timeout`.
    #[must_use]
    pub const fn new(step_timeout: Duration) -> Self {
        Self { step_timeout }
    }

    /// Executes `skill` with `inputs` on behalf of `context.caller`.
    ///
    /// Required inputs are checked before any step runs. Every step spends
    /// from the caller's single deadline and is further capped by the step
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError`] for missing inputs, unresolved template
    /// variables, invalid definitions and the first failing step.
    pub async fn execute(
        &self,
        skill: &Skill,
        inputs: &Map<String, Value>,
        invoker: &dyn ToolInvoker,
        context: &CallContext,
    ) -> Result<SkillRun, WorkflowError> {
        skill.validate()?;
        let tools = skill.tool_references()?;
        let mut environment = BindingEnvironment::new(bind_inputs(skill, inputs)?);
        let run_id = Uuid::new_v4();
        info!(%run_id, skill = %skill.name, steps = skill.steps.len(), "skill run started");

        let mut steps = Vec::with_capacity(skill.steps.len());
        for (position, (step, tool)) in skill.steps.iter().zip(&tools).enumerate() {
            let index = position.saturating_add(1);
            let step_context = context.capped(self.step_timeout);
            let output = run_step(invoker, &step_context, &environment, index, step, tool)
                .await
                .inspect_err(|err| {
                    warn!(%run_id, skill = %skill.name, step = index, completed = steps.len(), "skill run aborted: {err}");
                })?;
            let result = bounded(output.joined_text(), &run_id, index);
            debug!(%run_id, step = index, tool = %tool, bytes = result.len(), "step completed");
            environment.push_step_result(Value::String(result.clone()));
            steps.push(StepResult {
                step: index,
                tool: tool.to_string(),
                result,
                output,
            });
        }

        let designated = skill.result_step();
        let final_output = steps
            .get(designated.saturating_sub(1))
            .map(|step| step.output.clone())
            .ok_or(RegistryDomainError::InvalidResultStep {
                result: designated,
                steps: steps.len(),
            })?;
        info!(%run_id, skill = %skill.name, "skill run completed");
        Ok(SkillRun {
            run_id,
            skill: skill.name.clone(),
            steps,
            final_output,
        })
    }
}

fn bind_inputs(
    skill: &Skill,
    supplied: &Map<String, Value>,
) -> Result<Map<String, Value>, WorkflowError> {
    let mut bound = Map::new();
    for input in &skill.inputs {
        let value = match (supplied.get(&input.name), &input.default) {
            (Some(value), _) | (None, Some(value)) => value.clone(),
            (None, None) if input.required => {
                return Err(WorkflowError::MissingInput {
                    skill: skill.name.clone(),
                    input: input.name.clone(),
                });
            }
            (None, None) => Value::String(String::new()),
        };
        bound.insert(input.name.clone(), value);
    }
    for extra in supplied
        .keys()
        .filter(|name| !skill.inputs.iter().any(|input| &input.name == *name))
    {
        debug!(skill = %skill.name, input = %extra, "ignoring undeclared skill input");
    }
    Ok(bound)
}

async fn run_step(
    invoker: &dyn ToolInvoker,
    context: &CallContext,
    environment: &BindingEnvironment,
    index: usize,
    step: &SkillStep,
    tool: &NamespacedToolName,
) -> Result<ToolOutput, WorkflowError> {
    let arguments = render_arguments(&step.arguments, environment).map_err(|(argument, err)| {
        let variable = match err {
            TemplateError::Unbound(name) | TemplateError::Unsupported(name) => name,
            other => other.to_string(),
        };
        WorkflowError::Binding {
            step: index,
            argument,
            variable,
        }
    })?;

    let failed = |source: GatewayError| WorkflowError::StepFailed {
        step: index,
        tool: tool.clone(),
        source: Box::new(source),
    };
    let output = invoker
        .invoke_tool(context, tool, Value::Object(arguments))
        .await
        .map_err(failed)?;
    if output.is_error {
        return Err(failed(GatewayError::Invocation {
            provider: tool.provider().to_string(),
            tool: tool.tool().to_owned(),
            step: Some(index),
            reason: output.joined_text(),
        }));
    }
    Ok(output)
}

fn bounded(mut text: String, run_id: &Uuid, step: usize) -> String {
    if text.len() <= MAX_STEP_RESULT_BYTES {
        return text;
    }
    let mut cut = MAX_STEP_RESULT_BYTES;
    while !text.is_char_boundary(cut) {
        cut = cut.saturating_sub(1);
    }
    warn!(%run_id, step, bytes = text.len(), limit = MAX_STEP_RESULT_BYTES, "truncating step result");
    text.truncate(cut);
    text
}
