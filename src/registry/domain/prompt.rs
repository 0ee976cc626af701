//! Prompt templates.

use super::item::{check_transition, validate_item_name};
use super::{ItemState, RegistryDomainError};
use minijinja::{Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Named prompt argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name as used in the template.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Whether rendering fails without it.
    #[serde(default)]
    pub required: bool,
    /// Value used when the caller omits the argument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Text template with declared arguments.
///
/// Templates use `{{argument}}` substitution; any variable not declared as
/// an argument is rejected when the prompt is validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// Unique prompt name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    state: ItemState,
    /// Ordered argument declarations.
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
    /// Template source.
    pub template: String,
}

fn environment() -> Environment<'static> {
    let mut environment = Environment::new();
    environment.set_undefined_behavior(UndefinedBehavior::Strict);
    environment
}

impl Prompt {
    /// Creates a draft prompt without arguments.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            state: ItemState::Draft,
            arguments: Vec::new(),
            template: template.into(),
        }
    }

    /// Appends an argument declaration.
    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, required: bool) -> Self {
        self.arguments.push(PromptArgument {
            name: name.into(),
            description: String::new(),
            required,
            default: None,
        });
        self
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ItemState {
        self.state
    }

    /// Resets the lifecycle state to draft.
    #[must_use]
    pub fn into_draft(mut self) -> Self {
        self.state = ItemState::Draft;
        self
    }

    pub(super) fn transition_to(&mut self, target: ItemState) -> Result<(), RegistryDomainError> {
        check_transition(self.state, target)?;
        self.state = target;
        Ok(())
    }

    /// Checks the name, argument uniqueness and template variables.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryDomainError`] found.
    pub fn validate(&self) -> Result<(), RegistryDomainError> {
        validate_item_name(&self.name)?;
        let mut declared = HashSet::new();
        for argument in &self.arguments {
            if !declared.insert(argument.name.as_str()) {
                return Err(RegistryDomainError::DuplicateParameter {
                    item: self.name.clone(),
                    name: argument.name.clone(),
                });
            }
        }

        let engine = environment();
        let template = engine
            .template_from_str(&self.template)
            .map_err(|err| RegistryDomainError::PromptSyntax {
                prompt: self.name.clone(),
                message: err.to_string(),
            })?;
        let mut undeclared: Vec<_> = template
            .undeclared_variables(false)
            .into_iter()
            .filter(|variable| !declared.contains(variable.as_str()))
            .collect();
        undeclared.sort();
        match undeclared.into_iter().next() {
            Some(variable) => Err(RegistryDomainError::UndeclaredVariable {
                prompt: self.name.clone(),
                variable,
            }),
            None => Ok(()),
        }
    }

    /// Renders the template with `arguments`, applying declared defaults.
    ///
    /// Every required argument is checked before rendering starts, so a
    /// failure never yields partial output.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::MissingArgument`] for a missing
    /// required argument and [`RegistryDomainError::Render`] when the
    /// template engine fails.
    pub fn render(&self, arguments: &Map<String, Value>) -> Result<String, RegistryDomainError> {
        let mut context = Map::new();
        for declared in &self.arguments {
            let supplied = arguments
                .get(&declared.name)
                .filter(|value| !value.is_null())
                .or(declared.default.as_ref());
            match supplied {
                Some(value) => {
                    context.insert(declared.name.clone(), value.clone());
                }
                None if declared.required => {
                    return Err(RegistryDomainError::MissingArgument {
                        prompt: self.name.clone(),
                        argument: declared.name.clone(),
                    });
                }
                None => {
                    context.insert(declared.name.clone(), Value::String(String::new()));
                }
            }
        }

        environment()
            .render_str(&self.template, &context)
            .map_err(|err| RegistryDomainError::Render {
                prompt: self.name.clone(),
                message: err.to_string(),
            })
    }
}
