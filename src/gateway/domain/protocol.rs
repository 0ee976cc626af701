//! Method parameters and results of the client-facing protocol.

use crate::catalog::domain::{ContentBlock, ToolDefinition};
use crate::jsonrpc::PROTOCOL_VERSION;
use crate::registry::domain::{Prompt, PromptArgument};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Name and version reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

/// Result of `initialize`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol revision spoken by the gateway.
    pub protocol_version: String,
    /// Gateway identity.
    pub server_info: ServerInfo,
    /// Advertised capabilities.
    pub capabilities: Value,
}

impl InitializeResult {
    /// Creates the handshake answer advertising tools and prompts.
    #[must_use]
    pub fn new(server_info: ServerInfo) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_owned(),
            server_info,
            capabilities: json!({
                "tools": {"listChanged": true},
                "prompts": {"listChanged": true}
            }),
        }
    }
}

/// Result of `tools/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsListResult {
    /// Tools visible to the caller under their namespaced names.
    pub tools: Vec<ToolDefinition>,
}

/// Parameters of `tools/call`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolCallParams {
    /// Namespaced tool name.
    pub name: String,
    /// Tool arguments.
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Caller deadline in milliseconds; the gateway default applies when
    /// absent.
    #[serde(default, rename = "timeoutMs")]
    pub timeout_ms: Option<u64>,
}

/// Prompt as listed by `prompts/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptDescriptor {
    /// Prompt name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Declared arguments.
    pub arguments: Vec<PromptArgument>,
}

impl From<Prompt> for PromptDescriptor {
    fn from(prompt: Prompt) -> Self {
        Self {
            name: prompt.name,
            description: prompt.description,
            arguments: prompt.arguments,
        }
    }
}

/// Parameters of `prompts/get`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromptGetParams {
    /// Prompt name.
    pub name: String,
    /// Argument values.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// One message of a rendered prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    /// Message author, always `user`.
    pub role: String,
    /// Rendered text.
    pub content: ContentBlock,
}

/// Result of `prompts/get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptGetResult {
    /// Prompt description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Rendered messages.
    pub messages: Vec<PromptMessage>,
}

impl PromptGetResult {
    /// Wraps rendered text as a single user message.
    #[must_use]
    pub fn rendered(description: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            messages: vec![PromptMessage {
                role: "user".to_owned(),
                content: ContentBlock::text(text),
            }],
        }
    }
}
