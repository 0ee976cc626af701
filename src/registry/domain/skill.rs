//! Multi-step skill definitions.

use super::item::{check_transition, validate_item_name};
use super::template::{Binding, collect_bindings};
use super::{ItemState, RegistryDomainError};
use crate::catalog::domain::{InputSchema, NamespacedToolName};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

fn default_input_type() -> String {
    "string".to_owned()
}

/// Declared skill input parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillInput {
    /// Parameter name, referenced as `input.<name>`.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Whether a run fails without it.
    #[serde(default)]
    pub required: bool,
    /// Value used when the caller omits the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// JSON schema type advertised for the input.
    #[serde(rename = "type", default = "default_input_type")]
    pub input_type: String,
}

/// One tool invocation within a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillStep {
    /// Namespaced tool, `provider__tool`.
    pub tool: String,
    /// Argument templates keyed by argument name.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl SkillStep {
    /// Creates a step from a JSON object of argument templates.
    #[must_use]
    pub fn new(tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool: tool.into(),
            arguments: match arguments {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }
}

/// Sequential tool workflow with typed inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    /// Unique skill name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    state: ItemState,
    /// Ordered input declarations.
    #[serde(default)]
    pub inputs: Vec<SkillInput>,
    /// Steps in execution order.
    pub steps: Vec<SkillStep>,
    /// One-based step whose output is the run result; the last by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<usize>,
}

impl Skill {
    /// Creates a draft skill.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, steps: Vec<SkillStep>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            state: ItemState::Draft,
            inputs: Vec::new(),
            steps,
            result: None,
        }
    }

    /// Appends a string input declaration.
    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, required: bool) -> Self {
        self.inputs.push(SkillInput {
            name: name.into(),
            description: String::new(),
            required,
            default: None,
            input_type: default_input_type(),
        });
        self
    }

    /// Designates the step whose output becomes the run result.
    #[must_use]
    pub const fn with_result_step(mut self, step: usize) -> Self {
        self.result = Some(step);
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

    /// Returns the one-based step providing the run result.
    #[must_use]
    pub fn result_step(&self) -> usize {
        self.result.unwrap_or(self.steps.len())
    }

    /// Parses every step tool reference.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::InvalidToolReference`] for the first
    /// reference that is not a namespaced name.
    pub fn tool_references(&self) -> Result<Vec<NamespacedToolName>, RegistryDomainError> {
        self.steps
            .iter()
            .enumerate()
            .map(|(position, step)| {
                NamespacedToolName::parse(&step.tool).map_err(|_| {
                    RegistryDomainError::InvalidToolReference {
                        step: position.saturating_add(1),
                        tool: step.tool.clone(),
                    }
                })
            })
            .collect()
    }

    /// Checks structure and every template reference.
    ///
    /// Tool references are only checked for shape here; whether they resolve
    /// depends on the catalog at activation time.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryDomainError`] found.
    pub fn validate(&self) -> Result<(), RegistryDomainError> {
        validate_item_name(&self.name)?;
        if self.steps.is_empty() {
            return Err(RegistryDomainError::NoSteps(self.name.clone()));
        }
        let mut declared = HashSet::new();
        for input in &self.inputs {
            if !declared.insert(input.name.as_str()) {
                return Err(RegistryDomainError::DuplicateParameter {
                    item: self.name.clone(),
                    name: input.name.clone(),
                });
            }
        }

        for (reference, (position, step)) in self
            .tool_references()?
            .iter()
            .zip(self.steps.iter().enumerate())
        {
            let index = position.saturating_add(1);
            if reference.provider().is_registry() {
                return Err(RegistryDomainError::RegistryToolReference {
                    step: index,
                    tool: step.tool.clone(),
                });
            }
            for (argument, template) in &step.arguments {
                let bindings = collect_bindings(template).map_err(|source| {
                    RegistryDomainError::Template {
                        step: index,
                        argument: argument.clone(),
                        source,
                    }
                })?;
                for binding in bindings {
                    check_binding(index, &binding, &declared)?;
                }
            }
        }

        match self.result {
            Some(result) if result == 0 || result > self.steps.len() => {
                Err(RegistryDomainError::InvalidResultStep {
                    result,
                    steps: self.steps.len(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Derives the tool input schema from the declared inputs.
    #[must_use]
    pub fn input_schema(&self) -> InputSchema {
        self.inputs
            .iter()
            .fold(InputSchema::object(), |schema, input| {
                let mut property = Map::new();
                property.insert("type".to_owned(), Value::String(input.input_type.clone()));
                if !input.description.is_empty() {
                    property.insert(
                        "description".to_owned(),
                        Value::String(input.description.clone()),
                    );
                }
                if let Some(default) = &input.default {
                    property.insert("default".to_owned(), default.clone());
                }
                schema.with_property(input.name.clone(), Value::Object(property), input.required)
            })
    }
}

fn check_binding(
    step: usize,
    binding: &Binding,
    declared: &HashSet<&str>,
) -> Result<(), RegistryDomainError> {
    match binding {
        Binding::Input(name) if !declared.contains(name.as_str()) => {
            Err(RegistryDomainError::UnknownInput {
                step,
                input: name.clone(),
            })
        }
        Binding::StepResult(referenced) if *referenced >= step => {
            Err(RegistryDomainError::ForwardReference {
                step,
                referenced: *referenced,
            })
        }
        Binding::Input(_) | Binding::StepResult(_) => Ok(()),
    }
}
