//! Protocol session layered over a framed JSON-RPC channel.

use crate::backend::ports::{TransportError, TransportResult, TransportSession};
use crate::catalog::domain::{ProviderName, ToolDefinition, ToolOutput};
use crate::jsonrpc::PROTOCOL_VERSION;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

const MAX_TOOL_PAGES: usize = 64;

/// Identity announced to backends in the `initialize` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClientIdentity {
    pub(crate) name: String,
    pub(crate) version: String,
}

/// Request/response framing shared by every wire transport.
#[async_trait]
pub(crate) trait RpcChannel: Send + Sync {
    /// Sends a request and waits for its correlated response.
    async fn request(&self, method: &str, params: Value, timeout: Duration)
    -> TransportResult<Value>;

    /// Sends a notification, which never receives a response.
    async fn notify(&self, method: &str, params: Value) -> TransportResult<()>;

    /// Closes the channel and releases owned resources.
    async fn shutdown(&self);
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolsPage {
    #[serde(default)]
    tools: Vec<ToolDefinition>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Initialized session over any [`RpcChannel`].
pub(crate) struct McpSession<C> {
    backend: ProviderName,
    channel: C,
}

impl<C: RpcChannel> McpSession<C> {
    /// Performs the `initialize` handshake and returns the ready session.
    ///
    /// The channel is shut down when the handshake fails.
    pub(crate) async fn establish(
        backend: ProviderName,
        channel: C,
        client: &ClientIdentity,
        timeout: Duration,
    ) -> TransportResult<Self> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": client.name, "version": client.version },
        });
        let handshake = async {
            let reply = channel.request("initialize", params, timeout).await?;
            let server = reply
                .pointer("/serverInfo/name")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            debug!(backend = %backend, server, "backend initialized");
            channel
                .notify("notifications/initialized", json!({}))
                .await
        };
        match handshake.await {
            Ok(()) => Ok(Self { backend, channel }),
            Err(err) => {
                channel.shutdown().await;
                Err(match err {
                    connection if connection.is_connection_failure() => connection,
                    other => TransportError::Handshake(other.to_string()),
                })
            }
        }
    }
}

#[async_trait]
impl<C: RpcChannel + 'static> TransportSession for McpSession<C> {
    async fn list_tools(&self, timeout: Duration) -> TransportResult<Vec<ToolDefinition>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor
                .as_ref()
                .map_or_else(|| json!({}), |next| json!({ "cursor": next }));
            let reply = self.channel.request("tools/list", params, timeout).await?;
            let page: ToolsPage = serde_json::from_value(reply)
                .map_err(|err| TransportError::Protocol(err.to_string()))?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }
        warn!(backend = %self.backend, "tool listing truncated after {MAX_TOOL_PAGES} pages");
        Ok(tools)
    }

    async fn invoke(
        &self,
        tool: &str,
        arguments: Value,
        timeout: Duration,
    ) -> TransportResult<ToolOutput> {
        let params = json!({ "name": tool, "arguments": arguments });
        let reply = self.channel.request("tools/call", params, timeout).await?;
        serde_json::from_value(reply).map_err(|err| TransportError::Protocol(err.to_string()))
    }

    async fn ping(&self, timeout: Duration) -> TransportResult<()> {
        self.channel.request("ping", json!({}), timeout).await?;
        Ok(())
    }

    async fn close(&self) {
        self.channel.shutdown().await;
    }
}
