//! Domain model for registry items.

mod error;
mod item;
mod prompt;
mod skill;
mod template;

pub use error::{RegistryDomainError, TemplateError};
pub use item::{ItemKind, ItemState, RegistryItem};
pub use prompt::{Prompt, PromptArgument};
pub use skill::{Skill, SkillInput, SkillStep};
pub use template::{
    ArgumentTemplate, Binding, BindingEnvironment, MAX_EXPRESSION_LENGTH, MAX_STEP_RESULT_BYTES,
    collect_bindings, render_arguments,
};
