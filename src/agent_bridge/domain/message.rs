//! Messages and tasks exchanged with agent peers.

use crate::catalog::domain::{ContentBlock, ToolOutput};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The requesting side.
    User,
    /// The answering agent.
    Agent,
}

/// Kind of message part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartType {
    /// Plain text.
    Text,
    /// File reference or inline bytes.
    File,
    /// Structured JSON.
    Data,
}

/// One piece of message or artifact content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Part kind.
    #[serde(rename = "type")]
    pub part_type: PartType,
    /// Text payload of text parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Remaining fields of file and data parts.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Part {
    /// Creates a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            part_type: PartType::Text,
            text: Some(text.into()),
            extra: Map::new(),
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self.part_type {
            PartType::Text => self.text.as_deref(),
            PartType::File | PartType::Data => None,
        }
    }
}

/// A message in a conversation with an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier.
    #[serde(default)]
    pub message_id: String,
    /// Author.
    pub role: MessageRole,
    /// Content parts.
    #[serde(default)]
    pub parts: Vec<Part>,
    /// String metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Message {
    /// Creates a user message asking the agent to run one skill.
    ///
    /// The request is carried both as readable text and as `skill_id` and
    /// `arguments` metadata.
    #[must_use]
    pub fn skill_invocation(skill_id: &str, arguments: &Value) -> Self {
        let encoded = arguments.to_string();
        let mut metadata = BTreeMap::new();
        metadata.insert("skill_id".to_owned(), skill_id.to_owned());
        metadata.insert("arguments".to_owned(), encoded.clone());
        Self {
            message_id: Uuid::new_v4().to_string(),
            role: MessageRole::User,
            parts: vec![Part::text(format!(
                "Invoke skill '{skill_id}' with arguments: {encoded}"
            ))],
            metadata,
        }
    }

    /// Creates an agent reply with one text part.
    #[must_use]
    pub fn agent_text(text: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            role: MessageRole::Agent,
            parts: vec![Part::text(text)],
            metadata: BTreeMap::new(),
        }
    }

    fn text_blocks(&self) -> impl Iterator<Item = ContentBlock> + '_ {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .map(ContentBlock::text)
    }
}

/// Lifecycle state of an agent task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Accepted, not yet started.
    Submitted,
    /// In progress.
    Working,
    /// Waiting for more input from the requester.
    InputRequired,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before completion.
    Cancelled,
    /// Refused by the agent.
    Rejected,
    /// A state this gateway does not recognise.
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// Returns whether the task will not change any more.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Rejected
        )
    }

    /// Returns whether the task ended without a usable result.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled | Self::Rejected)
    }
}

/// Current state of a task with an optional explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Lifecycle state.
    pub state: TaskState,
    /// Human-readable status detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Output produced by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact identifier.
    #[serde(default)]
    pub id: String,
    /// Artifact name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Content parts.
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Unit of work an agent performs for a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task identifier used for polling.
    pub id: String,
    /// Conversation the task belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// Current status.
    pub status: TaskStatus,
    /// Conversation history.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Produced artifacts.
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl Task {
    /// Creates a task in `state` without content.
    #[must_use]
    pub fn new(id: impl Into<String>, state: TaskState) -> Self {
        Self {
            id: id.into(),
            context_id: None,
            status: TaskStatus {
                state,
                message: None,
            },
            messages: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    /// Keeps only the last `length` messages; zero keeps everything.
    pub fn trim_history(&mut self, length: usize) {
        let excess = self.messages.len().saturating_sub(length);
        if length > 0 && excess > 0 {
            self.messages.drain(..excess);
        }
    }

    /// Converts the task into tool output.
    ///
    /// Failed tasks yield an error result carrying the status message.
    /// Otherwise agent message text and artifact text become content.
    #[must_use]
    pub fn into_output(self) -> ToolOutput {
        if self.status.state.is_failure() {
            let reason = self
                .status
                .message
                .unwrap_or_else(|| format!("task {} ended as {:?}", self.id, self.status.state));
            return ToolOutput::error(reason);
        }
        let content = self
            .messages
            .iter()
            .filter(|message| message.role == MessageRole::Agent)
            .flat_map(Message::text_blocks)
            .chain(
                self.artifacts
                    .iter()
                    .flat_map(|artifact| artifact.parts.iter())
                    .filter_map(Part::as_text)
                    .map(ContentBlock::text),
            )
            .collect();
        with_fallback(content)
    }
}

fn with_fallback(content: Vec<ContentBlock>) -> ToolOutput {
    if content.is_empty() {
        return ToolOutput::text("Task completed");
    }
    ToolOutput {
        content,
        is_error: false,
    }
}

/// Parameters of `message/send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageParams {
    /// Message to deliver.
    pub message: Message,
    /// Conversation to continue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl SendMessageParams {
    /// Wraps a message that starts a new conversation.
    #[must_use]
    pub const fn new(message: Message) -> Self {
        Self {
            message,
            context_id: None,
        }
    }
}

/// Parameters of `tasks/get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTaskParams {
    /// Task identifier.
    pub id: String,
    /// Number of most recent messages to return; zero or absent returns all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
}

impl GetTaskParams {
    /// Asks for the whole task `id`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            history_length: None,
        }
    }
}

/// Parameters of `tasks/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksParams {
    /// Only tasks in this conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// Only tasks in this state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskState>,
    /// Maximum number of tasks; zero or absent returns all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
}

impl ListTasksParams {
    /// Returns whether `task` passes the context and state filters.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.context_id
            .as_ref()
            .is_none_or(|context| task.context_id.as_ref() == Some(context))
            && self.status.is_none_or(|state| task.status.state == state)
    }

    /// Returns the page size limit, if any.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.page_size.filter(|size| *size > 0)
    }
}

/// Result of `tasks/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTasksResult {
    /// Matching tasks, oldest first.
    pub tasks: Vec<Task>,
}

/// Parameters of `tasks/cancel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTaskParams {
    /// Task identifier.
    pub id: String,
}

/// Result of `message/send`: a task to follow or a direct reply.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SendMessageResult {
    /// Task created for the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    /// Immediate agent reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

impl SendMessageResult {
    /// Returns the task when it still needs polling.
    #[must_use]
    pub fn pending_task(&self) -> Option<&str> {
        self.task
            .as_ref()
            .filter(|task| !task.status.state.is_terminal())
            .map(|task| task.id.as_str())
    }

    /// Converts the result into tool output.
    #[must_use]
    pub fn into_output(self) -> ToolOutput {
        match (self.task, self.message) {
            (Some(task), _) => task.into_output(),
            (None, Some(message)) => with_fallback(message.text_blocks().collect()),
            (None, None) => with_fallback(Vec::new()),
        }
    }
}
