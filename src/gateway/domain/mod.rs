//! Gateway protocol payloads and status reporting.

mod protocol;
mod status;

pub use protocol::{
    InitializeResult, PromptDescriptor, PromptGetParams, PromptGetResult, PromptMessage,
    ServerInfo, ToolCallParams, ToolsListResult,
};
pub use status::GatewayStatus;
