//! Records of completed skill runs.

use crate::catalog::domain::ToolOutput;
use serde::Serialize;
use uuid::Uuid;

/// Output of one executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    /// One-based step index.
    pub step: usize,
    /// Namespaced tool that was called.
    pub tool: String,
    /// Text bound as `step<N>.result` for later steps.
    pub result: String,
    /// Full tool output.
    pub output: ToolOutput,
}

/// A successful skill run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillRun {
    /// Identifier logged with every step of the run.
    pub run_id: Uuid,
    /// Skill name.
    pub skill: String,
    /// Results of every step in execution order.
    pub steps: Vec<StepResult>,
    /// Output of the designated result step.
    #[serde(rename = "final")]
    pub final_output: ToolOutput,
}

impl SkillRun {
    /// Returns the designated result as plain text.
    #[must_use]
    pub fn final_text(&self) -> String {
        self.final_output.joined_text()
    }
}
