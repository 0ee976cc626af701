//! Run records, call context and workflow errors.

mod context;
mod error;
mod run;

pub use context::CallContext;
pub use error::WorkflowError;
pub use run::{SkillRun, StepResult};
