//! Scriptable in-process agents for tests and local wiring.

use crate::agent_bridge::domain::{
    AgentAuth, AgentCard, AgentPeer, Artifact, Message, Part, SendMessageParams,
    SendMessageResult, Task, TaskState,
};
use crate::agent_bridge::ports::{AgentClient, AgentClientError, AgentClientResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Skill implementation: text on success, failure reason otherwise.
pub type SkillHandler = Arc<dyn Fn(&Value) -> Result<String, String> + Send + Sync>;

#[derive(Default)]
struct ScriptedAgent {
    card: Option<AgentCard>,
    handlers: HashMap<String, SkillHandler>,
    unreachable: bool,
    required_auth: Option<AgentAuth>,
    pending_polls: u32,
    tasks: HashMap<String, (u32, Task)>,
    messages: Vec<Message>,
    next_task: u64,
}

impl ScriptedAgent {
    fn serves(&self, endpoint: &str, url: &str) -> bool {
        endpoint == url || self.card.as_ref().is_some_and(|card| card.url == url)
    }

    fn complete(&self, message: &Message, task_id: String) -> Task {
        let skill = message.metadata.get("skill_id").cloned().unwrap_or_default();
        let arguments = message
            .metadata
            .get("arguments")
            .and_then(|encoded| serde_json::from_str(encoded).ok())
            .unwrap_or(Value::Null);
        let outcome = self.handlers.get(&skill).map_or_else(
            || Err(format!("unknown skill '{skill}'")),
            |handler| handler(&arguments),
        );
        match outcome {
            Ok(text) => {
                let mut task = Task::new(task_id, TaskState::Completed);
                task.artifacts.push(Artifact {
                    id: "result".to_owned(),
                    name: String::new(),
                    parts: vec![Part::text(text)],
                });
                task
            }
            Err(reason) => {
                let mut task = Task::new(task_id, TaskState::Failed);
                task.status.message = Some(reason);
                task
            }
        }
    }
}

/// In-memory [`AgentClient`] keyed by agent endpoint.
#[derive(Clone, Default)]
pub struct InMemoryAgentClient {
    agents: Arc<Mutex<HashMap<String, ScriptedAgent>>>,
}

impl fmt::Debug for InMemoryAgentClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let agents = self.agents.lock().unwrap_or_else(PoisonError::into_inner);
        formatter
            .debug_struct("InMemoryAgentClient")
            .field("agents", &agents.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl InMemoryAgentClient {
    /// Creates a client without agents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_agent<T>(&self, endpoint: &str, apply: impl FnOnce(&mut ScriptedAgent) -> T) -> T {
        let mut agents = self.agents.lock().unwrap_or_else(PoisonError::into_inner);
        apply(agents.entry(endpoint.to_owned()).or_default())
    }

    /// Serves `card` at `endpoint`.
    pub fn set_card(&self, endpoint: &str, card: AgentCard) {
        self.with_agent(endpoint, |agent| agent.card = Some(card));
    }

    /// Implements skill `skill_id` of the agent at `endpoint`.
    pub fn on_skill<F>(&self, endpoint: &str, skill_id: &str, handler: F)
    where
        F: Fn(&Value) -> Result<String, String> + Send + Sync + 'static,
    {
        self.with_agent(endpoint, |agent| {
            agent.handlers.insert(skill_id.to_owned(), Arc::new(handler));
        });
    }

    /// Makes the agent reachable or unreachable.
    pub fn set_reachable(&self, endpoint: &str, reachable: bool) {
        self.with_agent(endpoint, |agent| agent.unreachable = !reachable);
    }

    /// Rejects requests that do not carry `auth` with HTTP 401.
    pub fn require_auth(&self, endpoint: &str, auth: AgentAuth) {
        self.with_agent(endpoint, |agent| agent.required_auth = Some(auth));
    }

    /// Makes new tasks report `working` for `polls` polls before completing.
    pub fn set_pending_polls(&self, endpoint: &str, polls: u32) {
        self.with_agent(endpoint, |agent| agent.pending_polls = polls);
    }

    /// Returns the messages the agent at `endpoint` has received.
    #[must_use]
    pub fn received(&self, endpoint: &str) -> Vec<Message> {
        self.with_agent(endpoint, |agent| agent.messages.clone())
    }

    fn serving<T>(
        &self,
        peer: &AgentPeer,
        apply: impl FnOnce(&mut ScriptedAgent) -> AgentClientResult<T>,
    ) -> AgentClientResult<T> {
        let url = peer.url.as_str();
        let mut agents = self.agents.lock().unwrap_or_else(PoisonError::into_inner);
        let agent = agents
            .iter_mut()
            .find(|(endpoint, agent)| agent.serves(endpoint, url))
            .map(|(_, agent)| agent)
            .filter(|agent| !agent.unreachable)
            .ok_or_else(|| AgentClientError::Unreachable(format!("no agent answers at '{url}'")))?;
        if agent
            .required_auth
            .as_ref()
            .is_some_and(|required| peer.auth.as_ref() != Some(required))
        {
            return Err(AgentClientError::Status {
                status: 401,
                body: "missing or invalid credential".to_owned(),
            });
        }
        apply(agent)
    }
}

#[async_trait]
impl AgentClient for InMemoryAgentClient {
    async fn fetch_card(
        &self,
        peer: &AgentPeer,
        _timeout: Duration,
    ) -> AgentClientResult<AgentCard> {
        self.serving(peer, |agent| {
            agent.card.clone().ok_or(AgentClientError::Status {
                status: 404,
                body: "no agent card".to_owned(),
            })
        })
    }

    async fn send_message(
        &self,
        peer: &AgentPeer,
        params: SendMessageParams,
        _timeout: Duration,
    ) -> AgentClientResult<SendMessageResult> {
        self.serving(peer, |agent| {
            agent.next_task = agent.next_task.saturating_add(1);
            let task_id = format!("task-{}", agent.next_task);
            let finished = agent.complete(&params.message, task_id.clone());
            agent.messages.push(params.message);
            if agent.pending_polls == 0 {
                return Ok(SendMessageResult {
                    task: Some(finished),
                    message: None,
                });
            }
            agent
                .tasks
                .insert(task_id.clone(), (agent.pending_polls, finished));
            Ok(SendMessageResult {
                task: Some(Task::new(task_id, TaskState::Working)),
                message: None,
            })
        })
    }

    async fn get_task(
        &self,
        peer: &AgentPeer,
        task_id: &str,
        _timeout: Duration,
    ) -> AgentClientResult<Task> {
        self.serving(peer, |agent| {
            let (remaining, finished) =
                agent
                    .tasks
                    .get_mut(task_id)
                    .ok_or_else(|| AgentClientError::Rpc {
                        code: -32001,
                        message: format!("task '{task_id}' not found"),
                    })?;
            *remaining = remaining.saturating_sub(1);
            if *remaining > 0 {
                return Ok(Task::new(task_id, TaskState::Working));
            }
            Ok(finished.clone())
        })
    }
}
