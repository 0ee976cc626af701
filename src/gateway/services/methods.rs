//! JSON-RPC method table of the client-facing protocol.

use super::Gateway;
use crate::catalog::domain::ProviderName;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::domain::{
    InitializeResult, PromptDescriptor, PromptGetParams, PromptGetResult, ToolCallParams,
    ToolsListResult,
};
use crate::jsonrpc::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::workflow::domain::CallContext;
use mockable::Clock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

enum MethodError {
    Rpc(JsonRpcError),
    Gateway(GatewayError),
}

impl From<GatewayError> for MethodError {
    fn from(err: GatewayError) -> Self {
        Self::Gateway(err)
    }
}

impl MethodError {
    fn into_rpc(self) -> JsonRpcError {
        match self {
            Self::Rpc(error) => error,
            Self::Gateway(error) => error.to_rpc_error(),
        }
    }
}

type MethodResult = Result<Value, MethodError>;

fn params<T: DeserializeOwned>(request: &JsonRpcRequest) -> Result<T, MethodError> {
    let raw = request.params.clone().unwrap_or_else(|| json!({}));
    serde_json::from_value(raw).map_err(|err| {
        MethodError::Rpc(JsonRpcError::new(
            INVALID_PARAMS,
            format!("invalid params for '{}': {err}", request.method),
        ))
    })
}

fn encoded<T: Serialize>(value: &T) -> MethodResult {
    serde_json::to_value(value)
        .map_err(|err| MethodError::Rpc(JsonRpcError::new(INTERNAL_ERROR, err.to_string())))
}

impl<C> Gateway<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Parses one wire message and answers it.
    ///
    /// Returns `None` for notifications. Malformed input yields a parse or
    /// invalid-request error with a `null` id.
    #[must_use]
    pub async fn handle_message(
        &self,
        caller: Option<ProviderName>,
        body: &[u8],
    ) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(err) => {
                debug!("unparseable gateway message: {err}");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(PARSE_ERROR, format!("parse error: {err}")),
                ));
            }
        };
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) if request.jsonrpc == JSONRPC_VERSION => self.handle(caller, request).await,
            Ok(_) => Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
            )),
            Err(err) => Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(INVALID_REQUEST, format!("invalid request: {err}")),
            )),
        }
    }

    /// Dispatches one request on behalf of `caller`.
    ///
    /// Returns `None` for notifications.
    #[must_use]
    pub async fn handle(
        &self,
        caller: Option<ProviderName>,
        request: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            debug!(method = %request.method, "gateway notification");
            return None;
        }
        let outcome = self.dispatch(caller, &request).await;
        let id = request.id.unwrap_or(Value::Null);
        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => {
                let error = err.into_rpc();
                debug!(method = %request.method, code = error.code, "gateway method failed: {}", error.message);
                JsonRpcResponse::failure(id, error)
            }
        })
    }

    async fn dispatch(&self, caller: Option<ProviderName>, request: &JsonRpcRequest) -> MethodResult {
        match request.method.as_str() {
            "initialize" => encoded(&InitializeResult::new(self.server_info())),
            "ping" | "notifications/initialized" => Ok(json!({})),
            "tools/list" => encoded(&ToolsListResult {
                tools: self.list_tools(caller.as_ref())?,
            }),
            "tools/call" => {
                let call: ToolCallParams = params(request)?;
                let context = call.timeout_ms.map_or_else(
                    || self.context(caller.clone()),
                    |millis| CallContext::new(caller.clone(), Duration::from_millis(millis)),
                );
                let output = self
                    .call_tool_in(&context, &call.name, Value::Object(call.arguments))
                    .await?;
                encoded(&output)
            }
            "prompts/list" => {
                let prompts: Vec<PromptDescriptor> = self
                    .list_prompts()
                    .await
                    .into_iter()
                    .map(PromptDescriptor::from)
                    .collect();
                Ok(json!({ "prompts": prompts }))
            }
            "prompts/get" => {
                let get: PromptGetParams = params(request)?;
                encoded(&self.prompt(&get).await?)
            }
            "gateway/status" => encoded(&self.status().await),
            other => {
                warn!(method = other, "unknown gateway method");
                Err(MethodError::Rpc(JsonRpcError::new(
                    METHOD_NOT_FOUND,
                    format!("method '{other}' not found"),
                )))
            }
        }
    }

    async fn prompt(&self, get: &PromptGetParams) -> GatewayResult<PromptGetResult> {
        let (prompt, text) = self.render_prompt(&get.name, &get.arguments).await?;
        Ok(PromptGetResult::rendered(prompt.description, text))
    }
}
