//! Minimal tool backend speaking line-delimited JSON-RPC on stdio.
//!
//! Usage:
//!
//! ```text
//! mock_stdio_backend [--stderr-banner]
//! ```
//!
//! Exposes four tools across two `tools/list` pages:
//!
//! - `echo` returns its `text` argument.
//! - `add` returns the integer sum of `a` and `b`.
//! - `fail` always answers with an `isError` result.
//! - `get_time` returns the current UTC time in RFC 3339 form.
//!
//! The process exits when stdin closes.

use chrono::Utc;
use gatehouse::catalog::domain::{InputSchema, ToolDefinition, ToolOutput};
use gatehouse::jsonrpc::{
    INVALID_PARAMS, JsonRpcError, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND,
    PROTOCOL_VERSION,
};
use serde_json::{Value, json};
use std::env;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
enum BackendFault {
    #[error("stdio failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

fn schema(properties: &[(&str, &str)]) -> InputSchema {
    properties
        .iter()
        .fold(InputSchema::object(), |schema, (name, kind)| {
            schema.with_property(*name, json!({ "type": kind }), true)
        })
}

fn tool(name: &str, description: &str, properties: &[(&str, &str)]) -> Option<Value> {
    ToolDefinition::new(name, description, schema(properties))
        .ok()
        .and_then(|definition| serde_json::to_value(definition).ok())
}

fn tools_page(cursor: Option<&str>) -> Value {
    match cursor {
        None => json!({
            "tools": [
                tool("echo", "Echoes the given text", &[("text", "string")]),
                tool("add", "Adds two integers", &[("a", "integer"), ("b", "integer")]),
            ],
            "nextCursor": "2"
        }),
        Some(_) => json!({
            "tools": [
                tool("fail", "Always fails", &[]),
                tool("get_time", "Returns the current UTC time", &[]),
            ]
        }),
    }
}

fn integer(arguments: &Value, name: &str) -> Result<i64, JsonRpcError> {
    let value = arguments.get(name);
    value
        .and_then(Value::as_i64)
        .or_else(|| value.and_then(Value::as_str).and_then(|text| text.trim().parse().ok()))
        .ok_or_else(|| JsonRpcError::new(INVALID_PARAMS, format!("'{name}' must be an integer")))
}

fn call(params: &Value) -> Result<ToolOutput, JsonRpcError> {
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    match params.get("name").and_then(Value::as_str) {
        Some("echo") => Ok(ToolOutput::text(
            arguments
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        )),
        Some("add") => {
            let sum = integer(&arguments, "a")?.saturating_add(integer(&arguments, "b")?);
            Ok(ToolOutput::text(sum.to_string()))
        }
        Some("fail") => Ok(ToolOutput::error("this tool always fails")),
        Some("get_time") => Ok(ToolOutput::text(Utc::now().to_rfc3339())),
        Some(other) => Err(JsonRpcError::new(
            INVALID_PARAMS,
            format!("unknown tool '{other}'"),
        )),
        None => Err(JsonRpcError::new(INVALID_PARAMS, "missing tool name")),
    }
}

fn answer(request: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
    let params = request.params.clone().unwrap_or_else(|| json!({}));
    match request.method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {"name": "mock-stdio-backend", "version": env!("CARGO_PKG_VERSION")},
            "capabilities": {"tools": {}}
        })),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(tools_page(params.get("cursor").and_then(Value::as_str))),
        "tools/call" => call(&params).and_then(|output| {
            serde_json::to_value(output)
                .map_err(|err| JsonRpcError::new(INVALID_PARAMS, err.to_string()))
        }),
        other => Err(JsonRpcError::new(
            METHOD_NOT_FOUND,
            format!("method '{other}' not found"),
        )),
    }
}

async fn serve() -> Result<(), BackendFault> {
    let mut stdout = tokio::io::stdout();
    if env::args().any(|arg| arg == "--stderr-banner") {
        tokio::io::stderr()
            .write_all(b"mock backend ready\n")
            .await?;
    }
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Ok(request) = serde_json::from_str::<JsonRpcRequest>(&line) else {
            continue;
        };
        let Some(id) = request.id.clone() else {
            continue;
        };
        let response = match answer(&request) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        };
        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), BoxError> {
    serve().await.map_err(Into::into)
}
