//! Error types for registry item validation and rendering.

use thiserror::Error;

/// Errors raised while parsing or rendering step argument templates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{{` has no matching `}}`.
    #[error("unterminated template expression in '{0}'")]
    Unterminated(String),

    /// `{{ }}` with nothing inside.
    #[error("empty template expression")]
    EmptyExpression,

    /// The expression exceeds the length limit.
    #[error("template expression of {length} characters exceeds the limit of {limit}")]
    ExpressionTooLong {
        /// Expression length.
        length: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Only `input.<name>` and `step<N>.result` are supported.
    #[error("unsupported template expression '{0}'")]
    Unsupported(String),

    /// The expression references a value that is not bound.
    #[error("unresolved template variable '{0}'")]
    Unbound(String),
}

/// Errors returned while validating or rendering registry items.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryDomainError {
    /// The item name is empty or contains unsupported characters.
    #[error("invalid item name '{0}': use letters, digits, '-' or '_' without '__'")]
    InvalidName(String),

    /// The item kind is unknown.
    #[error("unknown item kind '{0}'")]
    UnknownKind(String),

    /// Two prompt arguments or skill inputs share a name.
    #[error("'{item}' declares '{name}' more than once")]
    DuplicateParameter {
        /// Item name.
        item: String,
        /// Repeated parameter name.
        name: String,
    },

    /// The prompt template does not compile.
    #[error("prompt '{prompt}' has an invalid template: {message}")]
    PromptSyntax {
        /// Prompt name.
        prompt: String,
        /// Template engine message.
        message: String,
    },

    /// The prompt template uses a variable that is not a declared argument.
    #[error("prompt '{prompt}' uses undeclared variable '{variable}'")]
    UndeclaredVariable {
        /// Prompt name.
        prompt: String,
        /// Undeclared variable.
        variable: String,
    },

    /// A required prompt argument was not supplied.
    #[error("prompt '{prompt}' requires argument '{argument}'")]
    MissingArgument {
        /// Prompt name.
        prompt: String,
        /// Missing argument.
        argument: String,
    },

    /// Rendering the prompt template failed.
    #[error("rendering prompt '{prompt}' failed: {message}")]
    Render {
        /// Prompt name.
        prompt: String,
        /// Template engine message.
        message: String,
    },

    /// A skill declares no steps.
    #[error("skill '{0}' declares no steps")]
    NoSteps(String),

    /// A step tool reference is not a namespaced tool name.
    #[error("step {step} references invalid tool '{tool}'")]
    InvalidToolReference {
        /// One-based step index.
        step: usize,
        /// Offending reference.
        tool: String,
    },

    /// A step targets a registry skill.
    #[error("step {step} may not call registry skill '{tool}'")]
    RegistryToolReference {
        /// One-based step index.
        step: usize,
        /// Offending reference.
        tool: String,
    },

    /// A step argument template is malformed.
    #[error("step {step} argument '{argument}': {source}")]
    Template {
        /// One-based step index.
        step: usize,
        /// Argument name.
        argument: String,
        /// Template failure.
        #[source]
        source: TemplateError,
    },

    /// A step references an input the skill does not declare.
    #[error("step {step} references undeclared input '{input}'")]
    UnknownInput {
        /// One-based step index.
        step: usize,
        /// Referenced input.
        input: String,
    },

    /// A step references its own or a later step's result.
    #[error("step {step} references step{referenced}.result, which has not run yet")]
    ForwardReference {
        /// One-based step index.
        step: usize,
        /// Referenced step index.
        referenced: usize,
    },

    /// The designated result step is out of range.
    #[error("result step {result} is outside 1..={steps}")]
    InvalidResultStep {
        /// Designated step.
        result: usize,
        /// Number of steps.
        steps: usize,
    },

    /// The requested lifecycle transition is not allowed.
    #[error("cannot move item from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },
}
