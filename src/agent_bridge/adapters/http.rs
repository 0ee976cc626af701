//! Agent peer protocol over HTTP.
//!
//! Cards are read from `/.well-known/agent.json` under the agent's base URL;
//! messages and task polls are JSON-RPC POSTs to the card's `url`.

use crate::agent_bridge::domain::{
    AgentCard, AgentPeer, GetTaskParams, SendMessageParams, SendMessageResult, Task,
};
use crate::agent_bridge::ports::{AgentClient, AgentClientError, AgentClientResult};
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

const CARD_PATH: &str = "/.well-known/agent.json";
const MAX_ERROR_BODY: usize = 512;

/// Returns the card location for an agent base URL.
///
/// URLs already naming an `agent.json` document are used unchanged.
#[must_use]
pub fn card_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.ends_with("agent.json") {
        return trimmed.to_owned();
    }
    format!("{}{CARD_PATH}", trimmed.trim_end_matches('/'))
}

fn classify(err: &reqwest::Error, method: &str, timeout: Duration) -> AgentClientError {
    if err.is_timeout() {
        AgentClientError::timeout(method, timeout)
    } else if err.is_connect() || err.is_request() {
        AgentClientError::Unreachable(err.to_string())
    } else {
        AgentClientError::Protocol(err.to_string())
    }
}

fn clipped(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut = cut.saturating_sub(1);
        }
        body.truncate(cut);
    }
    body
}

async fn checked(response: reqwest::Response) -> AgentClientResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AgentClientError::Status {
        status: status.as_u16(),
        body: clipped(body),
    })
}

fn authorized(request: reqwest::RequestBuilder, peer: &AgentPeer) -> reqwest::RequestBuilder {
    match peer.auth.as_ref().filter(|auth| !auth.token.is_empty()) {
        Some(auth) => {
            let (header, value) = auth.header_pair();
            request.header(header, value)
        }
        None => request,
    }
}

/// HTTP implementation of [`AgentClient`].
#[derive(Debug)]
pub struct HttpAgentClient {
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpAgentClient {
    /// Creates a client sharing `client`'s connection pool.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            next_id: AtomicU64::new(0),
        }
    }

    async fn call<P, R>(
        &self,
        peer: &AgentPeer,
        method: &str,
        params: &P,
        timeout: Duration,
    ) -> AgentClientResult<R>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        let encoded = serde_json::to_value(params)
            .map_err(|err| AgentClientError::Protocol(err.to_string()))?;
        let request = JsonRpcRequest::new(id, method, Some(encoded));
        debug!(url = %peer.url, method, id, "calling agent");
        let response = authorized(self.client.post(&peer.url), peer)
            .header(ACCEPT, "application/json")
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|err| classify(&err, method, timeout))?;
        let reply: JsonRpcResponse = checked(response)
            .await?
            .json()
            .await
            .map_err(|err| classify(&err, method, timeout))?;
        let result = reply.into_result().map_err(|error| AgentClientError::Rpc {
            code: error.code,
            message: error.message,
        })?;
        serde_json::from_value(result).map_err(|err| AgentClientError::Protocol(err.to_string()))
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn fetch_card(
        &self,
        peer: &AgentPeer,
        timeout: Duration,
    ) -> AgentClientResult<AgentCard> {
        let location = card_url(&peer.url);
        debug!(url = %location, "fetching agent card");
        let response = authorized(self.client.get(&location), peer)
            .header(ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| classify(&err, "agent card", timeout))?;
        checked(response)
            .await?
            .json()
            .await
            .map_err(|err| AgentClientError::Protocol(format!("agent card: {err}")))
    }

    async fn send_message(
        &self,
        peer: &AgentPeer,
        params: SendMessageParams,
        timeout: Duration,
    ) -> AgentClientResult<SendMessageResult> {
        self.call(peer, "message/send", &params, timeout).await
    }

    async fn get_task(
        &self,
        peer: &AgentPeer,
        task_id: &str,
        timeout: Duration,
    ) -> AgentClientResult<Task> {
        self.call(peer, "tasks/get", &GetTaskParams::new(task_id), timeout)
            .await
    }
}
