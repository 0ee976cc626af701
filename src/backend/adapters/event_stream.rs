//! JSON-RPC over a long-lived server-sent event stream.
//!
//! The backend announces a message endpoint in an `endpoint` event; requests
//! are POSTed there and responses arrive as `message` events on the stream.

use super::correlation::{Deadline, PendingRequests};
use super::http::{classify, status_error};
use super::rpc::RpcChannel;
use super::sse::{SseDecoder, SseEvent};
use crate::backend::ports::{TransportError, TransportResult};
use crate::catalog::domain::ProviderName;
use crate::jsonrpc::{JsonRpcRequest, parse_response};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Url;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::fmt::Display;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Channel backed by an open event stream and its message endpoint.
pub(crate) struct EventStreamChannel {
    client: reqwest::Client,
    message_url: Url,
    pending: PendingRequests,
    pump: JoinHandle<()>,
}

impl EventStreamChannel {
    /// Opens the stream and waits for the endpoint announcement.
    pub(crate) async fn open(
        backend: ProviderName,
        client: reqwest::Client,
        stream_url: &str,
        timeout: Duration,
    ) -> TransportResult<Self> {
        let base =
            Url::parse(stream_url).map_err(|err| TransportError::Unreachable(err.to_string()))?;
        let response = tokio::time::timeout(
            timeout,
            client
                .get(base.clone())
                .header(ACCEPT, "text/event-stream")
                .send(),
        )
        .await
        .map_err(|_| TransportError::Unreachable(format!("'{base}' did not answer in time")))?
        .map_err(|err| classify(&err, "connect", timeout))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Unreachable(format!(
                "'{base}' answered HTTP {status}"
            )));
        }

        let mut stream = Box::pin(response.bytes_stream());
        let mut decoder = SseDecoder::default();
        let (endpoint, backlog) = tokio::time::timeout(
            timeout,
            await_endpoint(&mut stream, &mut decoder),
        )
        .await
        .map_err(|_| TransportError::Handshake("no endpoint event received".to_owned()))??;
        let message_url = base
            .join(&endpoint)
            .map_err(|err| TransportError::Protocol(format!("bad endpoint '{endpoint}': {err}")))?;
        debug!(backend = %backend, endpoint = %message_url, "event stream attached");

        let pending = PendingRequests::default();
        for event in backlog {
            deliver(&backend, &pending, &event);
        }
        let pump = tokio::spawn(pump_events(backend, stream, decoder, pending.clone()));

        Ok(Self {
            client,
            message_url,
            pending,
            pump,
        })
    }

    async fn post(&self, message: &JsonRpcRequest, deadline: Deadline) -> TransportResult<()> {
        let remaining = deadline.remaining();
        if remaining.is_zero() {
            return Err(deadline.expired(&message.method));
        }
        let response = self
            .client
            .post(self.message_url.clone())
            .timeout(remaining)
            .json(message)
            .send()
            .await
            .map_err(|err| match classify(&err, &message.method, remaining) {
                TransportError::Timeout { .. } => deadline.expired(&message.method),
                other => other,
            })?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(self.message_url.as_str(), status))
        }
    }
}

async fn await_endpoint<S, B, E>(
    stream: &mut S,
    decoder: &mut SseDecoder,
) -> TransportResult<(String, Vec<SseEvent>)>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut backlog = Vec::new();
    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|err| TransportError::ConnectionClosed(err.to_string()))?;
        let mut endpoint = None;
        for event in decoder.push(bytes.as_ref()) {
            if endpoint.is_none() && event.event == "endpoint" {
                endpoint = Some(event.data);
            } else {
                backlog.push(event);
            }
        }
        if let Some(found) = endpoint {
            return Ok((found, backlog));
        }
    }
    Err(TransportError::ConnectionClosed(
        "stream ended before announcing an endpoint".to_owned(),
    ))
}

fn deliver(backend: &ProviderName, pending: &PendingRequests, event: &SseEvent) {
    if event.event != "message" {
        return;
    }
    match parse_response(&event.data) {
        Some(response) => {
            if !pending.resolve(response) {
                debug!(backend = %backend, "dropping response nobody waits for");
            }
        }
        None => debug!(backend = %backend, "ignoring non-response stream message"),
    }
}

async fn pump_events<S, B, E>(
    backend: ProviderName,
    mut stream: S,
    mut decoder: SseDecoder,
    pending: PendingRequests,
) where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                for event in decoder.push(bytes.as_ref()) {
                    deliver(&backend, &pending, &event);
                }
            }
            Err(err) => {
                warn!(backend = %backend, "event stream failed: {err}");
                pending.close(&format!("event stream failed: {err}"));
                return;
            }
        }
    }
    if let Some(event) = decoder.finish() {
        deliver(&backend, &pending, &event);
    }
    pending.close("event stream ended");
}

#[async_trait]
impl RpcChannel for EventStreamChannel {
    async fn request(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> TransportResult<Value> {
        let deadline = Deadline::after(timeout);
        let call = self.pending.register()?;
        let request = JsonRpcRequest::new(call.id(), method, Some(params));
        self.post(&request, deadline).await?;
        call.wait(method, deadline).await
    }

    async fn notify(&self, method: &str, params: Value) -> TransportResult<()> {
        let notification = JsonRpcRequest::notification(method, Some(params));
        self.post(&notification, Deadline::after(NOTIFY_TIMEOUT))
            .await
    }

    async fn shutdown(&self) {
        self.pump.abort();
        self.pending.close("session closed");
    }
}

impl Drop for EventStreamChannel {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
