//! Errors raised by skill runs.

use crate::catalog::domain::NamespacedToolName;
use crate::error::GatewayError;
use crate::registry::domain::RegistryDomainError;
use thiserror::Error;

/// Reasons a skill run stops.
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    /// A required input was not supplied and has no default.
    #[error("skill '{skill}' requires input '{input}'")]
    MissingInput {
        /// Skill name.
        skill: String,
        /// Missing input name.
        input: String,
    },

    /// A step argument references a value that is not bound.
    #[error("step {step} argument '{argument}' cannot resolve '{variable}'")]
    Binding {
        /// One-based step index.
        step: usize,
        /// Argument whose template failed.
        argument: String,
        /// Offending template variable or expression.
        variable: String,
    },

    /// The skill definition itself is invalid.
    #[error(transparent)]
    Definition(#[from] RegistryDomainError),

    /// A step's tool call failed; later steps did not run.
    #[error("step {step} ({tool}) failed: {source}")]
    StepFailed {
        /// One-based step index.
        step: usize,
        /// Namespaced tool the step called.
        tool: NamespacedToolName,
        /// Routing or invocation failure.
        #[source]
        source: Box<GatewayError>,
    },
}
