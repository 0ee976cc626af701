//! Argument templates for skill steps.
//!
//! The language is a restricted binding lookup: `{{input.<name>}}` reads a
//! skill input and `{{step<N>.result}}` reads the result of step `N`
//! (1-based). There are no operators, filters or function calls. A string
//! consisting of a single expression binds the referenced value with its
//! JSON type; anything else renders to a string.

use super::TemplateError;
use serde_json::{Map, Value};
use std::fmt;

/// Maximum length of one expression between the braces.
pub const MAX_EXPRESSION_LENGTH: usize = 500;

/// Maximum size of a step result bound for later steps.
pub const MAX_STEP_RESULT_BYTES: usize = 1024 * 1024;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A value reference inside a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Binding {
    /// `input.<name>`
    Input(String),
    /// `step<N>.result`, 1-based.
    StepResult(usize),
}

impl Binding {
    fn parse(expression: &str) -> Result<Self, TemplateError> {
        if expression.is_empty() {
            return Err(TemplateError::EmptyExpression);
        }
        if expression.len() > MAX_EXPRESSION_LENGTH {
            return Err(TemplateError::ExpressionTooLong {
                length: expression.len(),
                limit: MAX_EXPRESSION_LENGTH,
            });
        }
        if let Some(name) = expression.strip_prefix("input.") {
            let valid = !name.is_empty()
                && name
                    .chars()
                    .all(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '-'));
            return if valid {
                Ok(Self::Input(name.to_owned()))
            } else {
                Err(TemplateError::Unsupported(expression.to_owned()))
            };
        }
        expression
            .strip_prefix("step")
            .and_then(|rest| rest.strip_suffix(".result"))
            .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .and_then(|digits| digits.parse::<usize>().ok())
            .filter(|index| *index > 0)
            .map(Self::StepResult)
            .ok_or_else(|| TemplateError::Unsupported(expression.to_owned()))
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(name) => write!(formatter, "input.{name}"),
            Self::StepResult(index) => write!(formatter, "step{index}.result"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Value(Binding),
}

/// A parsed template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentTemplate {
    segments: Vec<Segment>,
}

impl ArgumentTemplate {
    /// Parses `source` into literal text and bindings.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] for unterminated, empty, oversized or
    /// unsupported expressions.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        while let Some((before, after_open)) = rest.split_once(OPEN) {
            let (expression, after_close) = after_open
                .split_once(CLOSE)
                .ok_or_else(|| TemplateError::Unterminated(source.to_owned()))?;
            if !before.is_empty() {
                segments.push(Segment::Text(before.to_owned()));
            }
            segments.push(Segment::Value(Binding::parse(expression.trim())?));
            rest = after_close;
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_owned()));
        }
        Ok(Self { segments })
    }

    /// Returns the bindings referenced by the template.
    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Value(binding) => Some(binding),
            Segment::Text(_) => None,
        })
    }

    /// Renders the template against `environment`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Unbound`] when a binding has no value.
    pub fn render(&self, environment: &BindingEnvironment) -> Result<Value, TemplateError> {
        if let [Segment::Value(binding)] = self.segments.as_slice() {
            return environment.lookup(binding).cloned();
        }
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => rendered.push_str(text),
                Segment::Value(binding) => match environment.lookup(binding)? {
                    Value::String(text) => rendered.push_str(text),
                    other => rendered.push_str(&other.to_string()),
                },
            }
        }
        Ok(Value::String(rendered))
    }
}

/// Values visible to step templates during one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingEnvironment {
    inputs: Map<String, Value>,
    steps: Vec<Value>,
}

impl BindingEnvironment {
    /// Creates an environment holding the resolved skill inputs.
    #[must_use]
    pub const fn new(inputs: Map<String, Value>) -> Self {
        Self {
            inputs,
            steps: Vec::new(),
        }
    }

    /// Binds the result of the next step.
    pub fn push_step_result(&mut self, result: Value) {
        self.steps.push(result);
    }

    /// Returns the number of bound step results.
    #[must_use]
    pub fn completed_steps(&self) -> usize {
        self.steps.len()
    }

    /// Looks up a binding.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Unbound`] when nothing is bound.
    pub fn lookup(&self, binding: &Binding) -> Result<&Value, TemplateError> {
        let found = match binding {
            Binding::Input(name) => self.inputs.get(name),
            Binding::StepResult(index) => index
                .checked_sub(1)
                .and_then(|position| self.steps.get(position)),
        };
        found.ok_or_else(|| TemplateError::Unbound(binding.to_string()))
    }
}

/// Collects every binding referenced anywhere inside `value`.
///
/// # Errors
///
/// Returns the first [`TemplateError`] found while parsing strings.
pub fn collect_bindings(value: &Value) -> Result<Vec<Binding>, TemplateError> {
    let mut found = Vec::new();
    collect_into(value, &mut found)?;
    Ok(found)
}

fn collect_into(value: &Value, found: &mut Vec<Binding>) -> Result<(), TemplateError> {
    match value {
        Value::String(text) => {
            found.extend(ArgumentTemplate::parse(text)?.bindings().cloned());
        }
        Value::Array(items) => {
            for item in items {
                collect_into(item, found)?;
            }
        }
        Value::Object(fields) => {
            for field in fields.values() {
                collect_into(field, found)?;
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

/// Renders every template string inside `arguments`, recursing into arrays
/// and objects.
///
/// # Errors
///
/// Returns the first [`TemplateError`] along with the top-level argument
/// name it occurred in.
pub fn render_arguments(
    arguments: &Map<String, Value>,
    environment: &BindingEnvironment,
) -> Result<Map<String, Value>, (String, TemplateError)> {
    arguments
        .iter()
        .map(|(name, value)| {
            render_value(value, environment)
                .map(|rendered| (name.clone(), rendered))
                .map_err(|err| (name.clone(), err))
        })
        .collect()
}

fn render_value(value: &Value, environment: &BindingEnvironment) -> Result<Value, TemplateError> {
    match value {
        Value::String(text) => ArgumentTemplate::parse(text)?.render(environment),
        Value::Array(items) => items
            .iter()
            .map(|item| render_value(item, environment))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(fields) => fields
            .iter()
            .map(|(key, field)| Ok((key.clone(), render_value(field, environment)?)))
            .collect::<Result<Map<_, _>, _>>()
            .map(Value::Object),
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(value.clone()),
    }
}
