//! Agents served by the gateway itself.
//!
//! Hosted agents answer the peer protocol on the gateway's own listener:
//! their cards are published for discovery and `message/send` creates a task
//! that the agent's [`TaskHandler`] works synchronously. Tasks outlive the
//! request so that peers can poll, list and cancel them; terminal tasks are
//! purged once they are older than the retention period.

use super::bridge::{AgentError, AgentResult};
use crate::agent_bridge::domain::{
    AgentCard, CancelTaskParams, GetTaskParams, ListTasksParams, ListTasksResult, Message,
    SendMessageParams, SendMessageResult, Task, TaskState,
};
use crate::agent_bridge::ports::{TaskHandler, TaskStore, TaskStoreError};
use crate::catalog::domain::ProviderName;
use crate::jsonrpc::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND, PARSE_ERROR,
};
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Error code for unknown tasks.
pub const TASK_NOT_FOUND: i64 = -32001;
/// Error code for cancelling a task that already finished.
pub const TASK_NOT_CANCELLABLE: i64 = -32002;

/// Text of the reply given by agents without a handler.
pub const ACKNOWLEDGEMENT: &str = "Message received";

/// Summary of one hosted agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedAgentSummary {
    /// Hosting name, also the URL path segment.
    pub name: String,
    /// Card description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Message URL.
    pub url: String,
    /// Number of advertised skills.
    pub skill_count: usize,
}

struct HostedAgent {
    card: AgentCard,
    handler: Option<Arc<dyn TaskHandler>>,
}

struct Inner<C> {
    store: Arc<dyn TaskStore>,
    clock: Arc<C>,
    base_url: String,
    agents: RwLock<BTreeMap<String, HostedAgent>>,
}

/// Serves local agents over the peer protocol.
pub struct AgentHost<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for AgentHost<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn store_failure(err: &TaskStoreError) -> JsonRpcError {
    JsonRpcError::new(INTERNAL_ERROR, err.to_string())
}

fn params<T: DeserializeOwned>(request: &JsonRpcRequest) -> Result<T, JsonRpcError> {
    serde_json::from_value(request.params.clone().unwrap_or(Value::Null)).map_err(|err| {
        JsonRpcError::new(
            INVALID_PARAMS,
            format!("invalid {} params: {err}", request.method),
        )
    })
}

fn encoded<T: Serialize>(result: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(result).map_err(|err| JsonRpcError::new(INTERNAL_ERROR, err.to_string()))
}

fn task_not_found(id: &str) -> JsonRpcError {
    JsonRpcError::new(TASK_NOT_FOUND, format!("task not found: {id}"))
}

impl<C> AgentHost<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates a host whose agents live under `base_url`.
    #[must_use]
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<C>, base_url: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                clock,
                base_url: base_url.trim_end_matches('/').to_owned(),
                agents: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    /// Starts serving `card` as agent `name`.
    ///
    /// A card without a URL is given `<base>/a2a/<name>`. Without a handler
    /// every message completes at once with an acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Domain`] for invalid names or cards and
    /// [`AgentError::AlreadyRegistered`] when the name is taken.
    pub async fn host(
        &self,
        name: &ProviderName,
        mut card: AgentCard,
        handler: Option<Arc<dyn TaskHandler>>,
    ) -> AgentResult<AgentCard> {
        card.validate()?;
        if card.url.trim().is_empty() {
            card.url = format!("{}/a2a/{name}", self.inner.base_url);
        }
        let mut agents = self.inner.agents.write().await;
        if agents.contains_key(name.as_str()) {
            return Err(AgentError::AlreadyRegistered(name.to_string()));
        }
        info!(agent = %name, url = %card.url, "hosting agent");
        agents.insert(
            name.to_string(),
            HostedAgent {
                card: card.clone(),
                handler,
            },
        );
        Ok(card)
    }

    /// Stops serving agent `name`. Its tasks stay until purged.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotFound`] for names that are not hosted.
    pub async fn unhost(&self, name: &str) -> AgentResult<()> {
        if self.inner.agents.write().await.remove(name).is_none() {
            return Err(AgentError::NotFound(name.to_owned()));
        }
        info!(agent = name, "agent no longer hosted");
        Ok(())
    }

    /// Returns the card of hosted agent `name`.
    #[must_use]
    pub async fn card(&self, name: &str) -> Option<AgentCard> {
        self.inner
            .agents
            .read()
            .await
            .get(name)
            .map(|agent| agent.card.clone())
    }

    /// Returns every hosted card, ordered by hosting name.
    #[must_use]
    pub async fn cards(&self) -> Vec<AgentCard> {
        self.inner
            .agents
            .read()
            .await
            .values()
            .map(|agent| agent.card.clone())
            .collect()
    }

    /// Returns a summary of every hosted agent, ordered by name.
    #[must_use]
    pub async fn summaries(&self) -> Vec<HostedAgentSummary> {
        self.inner
            .agents
            .read()
            .await
            .iter()
            .map(|(name, agent)| HostedAgentSummary {
                name: name.clone(),
                description: agent.card.description.clone(),
                url: agent.card.url.clone(),
                skill_count: agent.card.skills.len(),
            })
            .collect()
    }

    /// Answers one peer protocol message addressed to agent `name`.
    ///
    /// Returns `None` for notifications.
    pub async fn handle_message(&self, name: &str, body: &[u8]) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(err) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(PARSE_ERROR, format!("parse error: {err}")),
                ));
            }
        };
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request = match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) if request.jsonrpc == JSONRPC_VERSION => request,
            Ok(_) => {
                return Some(JsonRpcResponse::failure(
                    id,
                    JsonRpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
                ));
            }
            Err(err) => {
                return Some(JsonRpcResponse::failure(
                    id,
                    JsonRpcError::new(INVALID_REQUEST, format!("invalid request: {err}")),
                ));
            }
        };
        if request.is_notification() {
            debug!(agent = name, method = %request.method, "hosted agent notification");
            return None;
        }
        let outcome = self.dispatch(name, &request).await;
        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    async fn dispatch(&self, name: &str, request: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        let handler = {
            let agents = self.inner.agents.read().await;
            let agent = agents.get(name).ok_or_else(|| {
                JsonRpcError::new(METHOD_NOT_FOUND, format!("agent not found: {name}"))
            })?;
            agent.handler.clone()
        };
        match request.method.as_str() {
            "message/send" => {
                let result = self.send_message(name, handler, params(request)?).await?;
                encoded(&result)
            }
            "tasks/get" => {
                let query: GetTaskParams = params(request)?;
                encoded(&self.get_task(name, &query).await?)
            }
            "tasks/list" => {
                let filter: ListTasksParams = match &request.params {
                    Some(_) => params(request)?,
                    None => ListTasksParams::default(),
                };
                encoded(&self.list_tasks(name, &filter).await?)
            }
            "tasks/cancel" => {
                let target: CancelTaskParams = params(request)?;
                encoded(&self.cancel_task(name, &target).await?)
            }
            other => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("unknown method: {other}"),
            )),
        }
    }

    async fn send_message(
        &self,
        name: &str,
        handler: Option<Arc<dyn TaskHandler>>,
        params: SendMessageParams,
    ) -> Result<SendMessageResult, JsonRpcError> {
        let mut message = params.message;
        if message.message_id.is_empty() {
            message.message_id = Uuid::new_v4().to_string();
        }
        let mut task = Task::new(Uuid::new_v4().to_string(), TaskState::Working);
        task.context_id = params.context_id;
        task.messages.push(message.clone());
        self.save(name, &task).await?;

        let finished = match handler {
            Some(handler) => match handler.handle(task.clone(), &message).await {
                Ok(updated) => updated,
                Err(reason) => {
                    warn!(agent = name, task = %task.id, "hosted agent failed the task: {reason}");
                    task.status.state = TaskState::Failed;
                    task.status.message = Some(reason);
                    task
                }
            },
            None => {
                task.status.state = TaskState::Completed;
                task.messages.push(Message::agent_text(ACKNOWLEDGEMENT));
                task
            }
        };
        self.save(name, &finished).await?;
        debug!(agent = name, task = %finished.id, state = ?finished.status.state, "hosted task worked");
        Ok(SendMessageResult {
            task: Some(finished),
            message: None,
        })
    }

    async fn get_task(&self, name: &str, params: &GetTaskParams) -> Result<Task, JsonRpcError> {
        let mut task = self
            .inner
            .store
            .get(name, &params.id)
            .await
            .map_err(|err| store_failure(&err))?
            .ok_or_else(|| task_not_found(&params.id))?;
        task.trim_history(params.history_length.unwrap_or_default());
        Ok(task)
    }

    async fn list_tasks(
        &self,
        name: &str,
        filter: &ListTasksParams,
    ) -> Result<ListTasksResult, JsonRpcError> {
        let tasks = self
            .inner
            .store
            .list(name, filter)
            .await
            .map_err(|err| store_failure(&err))?;
        Ok(ListTasksResult { tasks })
    }

    async fn cancel_task(&self, name: &str, params: &CancelTaskParams) -> Result<Task, JsonRpcError> {
        let mut task = self
            .inner
            .store
            .get(name, &params.id)
            .await
            .map_err(|err| store_failure(&err))?
            .ok_or_else(|| task_not_found(&params.id))?;
        if task.status.state.is_terminal() {
            return Err(JsonRpcError::new(
                TASK_NOT_CANCELLABLE,
                format!("task {} is already {:?}", task.id, task.status.state),
            ));
        }
        task.status.state = TaskState::Cancelled;
        task.status.message = None;
        self.save(name, &task).await?;
        info!(agent = name, task = %task.id, "hosted task cancelled");
        Ok(task)
    }

    async fn save(&self, name: &str, task: &Task) -> Result<(), JsonRpcError> {
        self.inner
            .store
            .save(name, task, self.inner.clock.utc())
            .await
            .map_err(|err| store_failure(&err))
    }

    /// Removes terminal tasks not updated within `max_age`.
    ///
    /// # Errors
    ///
    /// Returns the store failure, if any.
    pub async fn purge_finished_tasks(&self, max_age: Duration) -> Result<usize, TaskStoreError> {
        let now = self.inner.clock.utc();
        let cutoff = TimeDelta::from_std(max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let removed = self.inner.store.purge_terminal(cutoff).await?;
        if removed > 0 {
            debug!(removed, "purged finished hosted tasks");
        }
        Ok(removed)
    }

    /// Returns how many tasks are tracked.
    ///
    /// # Errors
    ///
    /// Returns the store failure, if any.
    pub async fn task_count(&self) -> Result<usize, TaskStoreError> {
        self.inner.store.count().await
    }

    /// Runs [`Self::purge_finished_tasks`] every `interval` until aborted.
    #[must_use]
    pub fn spawn_task_cleanup(&self, interval: Duration, max_age: Duration) -> JoinHandle<()> {
        let host = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = host.purge_finished_tasks(max_age).await {
                    warn!("hosted task cleanup failed: {err}");
                }
            }
        })
    }
}
