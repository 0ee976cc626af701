//! JSON-RPC over one HTTP POST per message.
//!
//! Responses arrive either as a JSON body or as a short event stream whose
//! `message` events carry the response. A session identifier issued by the
//! backend in `Mcp-Session-Id` is replayed on every later request.

use super::rpc::RpcChannel;
use super::sse::SseDecoder;
use crate::backend::ports::{TransportError, TransportResult};
use crate::catalog::domain::ProviderName;
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse, parse_response};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Header carrying the backend-issued session identifier.
pub(crate) const SESSION_HEADER: &str = "Mcp-Session-Id";

const ACCEPT_BOTH: &str = "application/json, text/event-stream";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Maps a client error onto the transport taxonomy.
pub(crate) fn classify(err: &reqwest::Error, method: &str, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::timeout(method, timeout)
    } else if err.is_connect() {
        TransportError::Unreachable(err.to_string())
    } else {
        TransportError::ConnectionClosed(err.to_string())
    }
}

/// Maps a non-success answer to a message POST onto the transport taxonomy.
///
/// Server errors mean the backend cannot serve anything right now. Client
/// errors reject only the request that caused them.
pub(crate) fn status_error(url: &str, status: reqwest::StatusCode) -> TransportError {
    if status.is_server_error() {
        TransportError::Unreachable(format!("'{url}' answered HTTP {status}"))
    } else {
        TransportError::Protocol(format!("'{url}' rejected the request with HTTP {status}"))
    }
}

/// Converts a correlated response into the call result.
pub(crate) fn into_reply(response: JsonRpcResponse) -> TransportResult<Value> {
    response.into_result().map_err(|error| TransportError::Rpc {
        code: error.code,
        message: error.message,
    })
}

/// Request/response channel to one HTTP endpoint.
pub(crate) struct HttpChannel {
    backend: ProviderName,
    client: reqwest::Client,
    url: String,
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl HttpChannel {
    pub(crate) fn new(backend: ProviderName, client: reqwest::Client, url: &str) -> Self {
        Self {
            backend,
            client,
            url: url.to_owned(),
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|guard| guard.clone())
    }

    fn remember_session(&self, headers: &HeaderMap) {
        let Some(value) = headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
        else {
            return;
        };
        if let Ok(mut guard) = self.session_id.lock() {
            if guard.as_deref() != Some(value) {
                debug!(backend = %self.backend, "backend issued session {value}");
                *guard = Some(value.to_owned());
            }
        }
    }

    async fn post(
        &self,
        message: &JsonRpcRequest,
        timeout: Duration,
    ) -> TransportResult<reqwest::Response> {
        let mut builder = self
            .client
            .post(&self.url)
            .header(ACCEPT, ACCEPT_BOTH)
            .timeout(timeout)
            .json(message);
        let session = self.session_id();
        if let Some(session) = &session {
            builder = builder.header(SESSION_HEADER, session);
        }
        let response = builder
            .send()
            .await
            .map_err(|err| classify(&err, &message.method, timeout))?;
        self.remember_session(response.headers());
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND && session.is_some() {
            return Err(TransportError::ConnectionClosed(format!(
                "'{}' no longer knows the session",
                self.url
            )));
        }
        if !status.is_success() {
            return Err(status_error(&self.url, status));
        }
        Ok(response)
    }
}

fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/event-stream"))
}

fn find_in_events(body: &str, id: u64) -> Option<JsonRpcResponse> {
    let mut decoder = SseDecoder::default();
    let mut events = decoder.push(body.as_bytes());
    events.extend(decoder.finish());
    events
        .into_iter()
        .filter(|event| event.event == "message")
        .filter_map(|event| parse_response(&event.data))
        .find(|response| response.numeric_id() == Some(id))
}

#[async_trait]
impl RpcChannel for HttpChannel {
    async fn request(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> TransportResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let request = JsonRpcRequest::new(id, method, Some(params));
        let response = self.post(&request, timeout).await?;
        let streamed = is_event_stream(response.headers());
        let body = response
            .text()
            .await
            .map_err(|err| classify(&err, method, timeout))?;

        let parsed = if streamed {
            find_in_events(&body, id)
        } else {
            parse_response(&body).filter(|candidate| candidate.numeric_id() == Some(id))
        };
        let reply = parsed.ok_or_else(|| {
            TransportError::Protocol(format!("no response for request {id} to '{method}'"))
        })?;
        into_reply(reply)
    }

    async fn notify(&self, method: &str, params: Value) -> TransportResult<()> {
        let notification = JsonRpcRequest::notification(method, Some(params));
        self.post(&notification, NOTIFY_TIMEOUT).await?;
        Ok(())
    }

    async fn shutdown(&self) {
        let Some(session) = self.session_id() else {
            return;
        };
        let result = self
            .client
            .delete(&self.url)
            .header(SESSION_HEADER, session)
            .timeout(SHUTDOWN_TIMEOUT)
            .send()
            .await;
        if let Err(err) = result {
            debug!(backend = %self.backend, "session termination failed: {err}");
        }
    }
}
