//! Routing path shared by direct tool calls and skill steps.

use crate::catalog::domain::{NamespacedToolName, ToolOutput};
use crate::error::GatewayResult;
use crate::workflow::domain::CallContext;
use async_trait::async_trait;
use serde_json::Value;

/// Resolves a namespaced tool for a caller and invokes it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Invokes `tool` with `arguments` on behalf of `context.caller`.
    ///
    /// Access is checked before the call is routed anywhere.
    async fn invoke_tool(
        &self,
        context: &CallContext,
        tool: &NamespacedToolName,
        arguments: Value,
    ) -> GatewayResult<ToolOutput>;
}
