//! Domain model for agent cards, declarations and peer messages.

mod card;
mod declaration;
mod error;
mod message;
mod peer;

pub use card::{AgentCard, AgentProvider, AgentSkill, skill_input_schema};
pub use declaration::{AgentDeclaration, AgentRole};
pub use error::AgentDomainError;
pub use message::{
    Artifact, CancelTaskParams, GetTaskParams, ListTasksParams, ListTasksResult, Message,
    MessageRole, Part, PartType, SendMessageParams, SendMessageResult, Task, TaskState, TaskStatus,
};
pub use peer::{AgentAuth, AgentPeer, AuthScheme, DEFAULT_AUTH_HEADER};
