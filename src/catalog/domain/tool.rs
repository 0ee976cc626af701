//! Tool definitions and invocation results in their wire shape.

use super::CatalogDomainError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured input schema: a type, named properties and required names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSchema {
    /// JSON schema type, `object` for every tool.
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,
    /// Named property schemas.
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Names of required properties.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Additional schema keywords preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_schema_type() -> String {
    "object".to_owned()
}

impl InputSchema {
    /// Creates an empty object schema.
    #[must_use]
    pub fn object() -> Self {
        Self {
            schema_type: default_schema_type(),
            properties: Map::new(),
            required: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Adds a property, optionally marking it as required.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let property_name = name.into();
        if required {
            self.required.push(property_name.clone());
        }
        self.properties.insert(property_name, schema);
        self
    }
}

impl Default for InputSchema {
    fn default() -> Self {
        Self::object()
    }
}

/// Metadata for a tool exposed by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    input_schema: InputSchema,
}

impl ToolDefinition {
    /// Creates a tool definition.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogDomainError::EmptyToolName`] when the name is empty
    /// after trimming.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
    ) -> Result<Self, CatalogDomainError> {
        let normalized_name = name.into().trim().to_owned();
        if normalized_name.is_empty() {
            return Err(CatalogDomainError::EmptyToolName);
        }

        Ok(Self {
            name: normalized_name,
            title: None,
            description: description.into().trim().to_owned(),
            input_schema,
        })
    }

    /// Sets a human-readable title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Returns a copy exposed under a different name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the optional title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Returns the tool description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the input schema.
    #[must_use]
    pub const fn input_schema(&self) -> &InputSchema {
        &self.input_schema
    }
}

/// One block of tool output content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Content type, usually `text`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Text payload for `text` blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Remaining fields of non-text blocks.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentBlock {
    /// Creates a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_owned(),
            text: Some(text.into()),
            extra: Map::new(),
        }
    }
}

/// Result of a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    /// Output content blocks.
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    /// Whether the tool reported a failure.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolOutput {
    /// Creates a successful single-text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
        }
    }

    /// Creates a failed single-text result.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: true,
        }
    }

    /// Joins all text blocks with newlines.
    #[must_use]
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_definition_uses_wire_field_names() {
        let tool = ToolDefinition::new(
            "add",
            "Adds two numbers",
            InputSchema::object()
                .with_property("a", json!({"type": "number"}), true)
                .with_property("b", json!({"type": "number"}), true),
        )
        .expect("valid tool");

        let encoded = serde_json::to_value(&tool).expect("tool should serialize");
        assert_eq!(
            encoded,
            json!({
                "name": "add",
                "description": "Adds two numbers",
                "inputSchema": {
                    "type": "object",
                    "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                    "required": ["a", "b"]
                }
            })
        );
    }

    #[test]
    fn tool_output_parses_backend_result() {
        let output: ToolOutput = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "text", "text": "second"}
            ],
            "isError": true
        }))
        .expect("result should parse");

        assert!(output.is_error);
        assert_eq!(output.joined_text(), "first\nsecond");
        let image = output.content.get(1).expect("image block");
        assert_eq!(image.extra.get("mimeType"), Some(&json!("image/png")));
    }

    #[test]
    fn successful_output_omits_error_flag() {
        let encoded = serde_json::to_value(ToolOutput::text("ok")).expect("serialize");
        assert_eq!(encoded, json!({"content": [{"type": "text", "text": "ok"}]}));
    }
}
