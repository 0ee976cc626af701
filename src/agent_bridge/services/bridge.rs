//! Registry of agent peers and their published skills.
//!
//! An agent contributes tools only while it is available: its card is known
//! and the last contact succeeded. Catalog publication happens under the
//! agents write lock so that availability and catalog contents never
//! disagree for an outside reader. Each registration carries a generation
//! number so that a discovery finishing after its agent was removed or
//! re-registered publishes nothing.

use crate::agent_bridge::domain::{
    AgentCard, AgentDeclaration, AgentDomainError, AgentPeer, AgentRole, Message,
    SendMessageParams,
};
use crate::agent_bridge::ports::{AgentClient, AgentClientError};
use crate::catalog::domain::{ProviderContribution, ProviderKind, ProviderName, ToolOutput};
use crate::catalog::services::{CatalogAggregator, CatalogError};
use crate::settings::GatewaySettings;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use mockable::Clock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Errors returned by agent bridge operations.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// The declaration or card is invalid.
    #[error(transparent)]
    Domain(#[from] AgentDomainError),

    /// The catalog rejected the agent name or contribution.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// An agent with this name already exists.
    #[error("agent '{0}' is already registered")]
    AlreadyRegistered(String),

    /// No agent with this name exists.
    #[error("agent '{0}' is not registered")]
    NotFound(String),

    /// The agent does not advertise the requested skill.
    #[error("agent '{agent}' has no skill '{skill}'")]
    UnknownSkill {
        /// Agent name.
        agent: String,
        /// Requested skill identifier.
        skill: String,
    },

    /// The agent cannot serve calls right now.
    #[error("agent '{agent}' is unavailable: {reason}")]
    Unavailable {
        /// Agent name or endpoint.
        agent: String,
        /// Connection failure or last recorded error.
        reason: String,
    },

    /// The agent was reachable but the skill call failed.
    #[error("skill '{skill}' on agent '{agent}' failed: {source}")]
    Invocation {
        /// Agent name.
        agent: String,
        /// Skill identifier.
        skill: String,
        /// Call-level client failure.
        #[source]
        source: AgentClientError,
    },
}

/// Result type for agent bridge operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Point-in-time status of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentStatus {
    /// Agent name.
    pub name: ProviderName,
    /// Local or remote.
    pub role: AgentRole,
    /// Declared endpoint.
    pub endpoint: String,
    /// Whether the agent's skills are in the catalog.
    pub available: bool,
    /// Advertised skill identifiers.
    pub skills: Vec<String>,
    /// Time of the last card fetch or availability change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    /// Last discovery or connection failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

struct AgentEntry {
    declaration: AgentDeclaration,
    generation: u64,
    card: Option<AgentCard>,
    available: bool,
    last_checked: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl AgentEntry {
    fn status(&self) -> AgentStatus {
        AgentStatus {
            name: self.declaration.name.clone(),
            role: self.declaration.role,
            endpoint: self.declaration.endpoint.clone(),
            available: self.available,
            skills: self
                .card
                .iter()
                .flat_map(|card| card.skills.iter().map(|skill| skill.id.clone()))
                .collect(),
            last_checked: self.last_checked,
            last_error: self.last_error.clone(),
        }
    }
}

struct Inner<C> {
    client: Arc<dyn AgentClient>,
    catalog: Arc<CatalogAggregator>,
    clock: Arc<C>,
    settings: GatewaySettings,
    agents: RwLock<HashMap<ProviderName, AgentEntry>>,
    registrations: AtomicU64,
}

/// Bridge exposing agent skills as catalog tools.
pub struct AgentBridge<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for AgentBridge<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> AgentBridge<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates a bridge without agents publishing into `catalog`.
    #[must_use]
    pub fn new(
        client: Arc<dyn AgentClient>,
        catalog: Arc<CatalogAggregator>,
        clock: Arc<C>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                catalog,
                clock,
                settings,
                agents: RwLock::new(HashMap::new()),
                registrations: AtomicU64::new(0),
            }),
        }
    }

    /// Fetches and validates the capability card served at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Unavailable`] when the card cannot be fetched
    /// and [`AgentError::Domain`] when it is invalid.
    pub async fn discover(&self, endpoint: &str) -> AgentResult<AgentCard> {
        self.discover_peer(&AgentPeer::new(endpoint.trim())).await
    }

    /// Like [`Self::discover`], sending the peer's credential.
    ///
    /// # Errors
    ///
    /// As for [`Self::discover`].
    pub async fn discover_peer(&self, peer: &AgentPeer) -> AgentResult<AgentCard> {
        debug!(endpoint = %peer.url, "discovering agent");
        let card = self
            .inner
            .client
            .fetch_card(peer, self.inner.settings.handshake_timeout)
            .await
            .map_err(|err| AgentError::Unavailable {
                agent: peer.url.clone(),
                reason: err.to_string(),
            })?;
        card.validate()?;
        Ok(card)
    }

    /// Registers an agent.
    ///
    /// Agents declared with an inline card are available immediately. All
    /// others are discovered first; a failed discovery leaves the agent
    /// registered but unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when the declaration is invalid, the name is
    /// taken, or the catalog rejects the name.
    pub async fn register(&self, declaration: AgentDeclaration) -> AgentResult<AgentStatus> {
        declaration.validate()?;
        let name = declaration.name.clone();
        {
            let mut agents = self.inner.agents.write().await;
            if agents.contains_key(&name) {
                return Err(AgentError::AlreadyRegistered(name.to_string()));
            }
            self.inner.catalog.reserve(&name, ProviderKind::Agent)?;
            info!(agent = %name, role = %declaration.role, "registering agent");
            let generation = self
                .inner
                .registrations
                .fetch_add(1, Ordering::Relaxed)
                .wrapping_add(1);
            agents.insert(
                name.clone(),
                AgentEntry {
                    declaration,
                    generation,
                    card: None,
                    available: false,
                    last_checked: None,
                    last_error: None,
                },
            );
        }
        self.refresh_agent(&name).await
    }

    /// Re-checks one agent and republishes or withdraws its skills.
    ///
    /// Failures are recorded in the returned status rather than returned.
    /// When the agent was re-registered while its card was being fetched,
    /// the outcome is discarded and the newer registration's status is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotFound`] for unknown agents.
    pub async fn refresh_agent(&self, name: &ProviderName) -> AgentResult<AgentStatus> {
        let (declaration, generation) = {
            let agents = self.inner.agents.read().await;
            agents
                .get(name)
                .map(|entry| (entry.declaration.clone(), entry.generation))
                .ok_or_else(|| AgentError::NotFound(name.to_string()))?
        };
        let outcome = match &declaration.card {
            Some(card) => Ok(card.clone()),
            None => self.discover_peer(&declaration.card_peer()).await,
        };

        let mut agents = self.inner.agents.write().await;
        let entry = agents
            .get_mut(name)
            .ok_or_else(|| AgentError::NotFound(name.to_string()))?;
        if entry.generation != generation {
            debug!(agent = %name, "discarding card from a superseded registration");
            return Ok(entry.status());
        }
        entry.last_checked = Some(self.inner.clock.utc());
        match outcome {
            Ok(card) => {
                let contribution =
                    ProviderContribution::new(name.clone(), ProviderKind::Agent, card.tools());
                if let Err(err) = self.inner.catalog.publish(contribution) {
                    error!(agent = %name, "publishing agent skills failed: {err}");
                }
                if !entry.available {
                    info!(agent = %name, skills = card.skills.len(), "agent available");
                }
                entry.card = Some(card);
                entry.available = true;
                entry.last_error = None;
            }
            Err(err) => {
                if let Err(catalog_err) = self.inner.catalog.withdraw(name) {
                    error!(agent = %name, "withdrawing agent failed: {catalog_err}");
                }
                warn!(agent = %name, "agent discovery failed: {err}");
                entry.available = false;
                entry.last_error = Some(err.to_string());
            }
        }
        Ok(entry.status())
    }

    /// Re-checks every agent concurrently.
    pub async fn refresh_availability(&self) {
        let names: Vec<_> = self.inner.agents.read().await.keys().cloned().collect();
        let checks = names.iter().map(|name| self.refresh_agent(name));
        for result in join_all(checks).await {
            if let Err(err) = result {
                debug!("skipping availability check: {err}");
            }
        }
    }

    /// Runs [`Self::refresh_availability`] every `interval` until aborted.
    #[must_use]
    pub fn spawn_availability_monitor(&self, interval: Duration) -> JoinHandle<()> {
        let bridge = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                bridge.refresh_availability().await;
            }
        })
    }

    /// Invokes `skill_id` on an available agent and waits for the outcome.
    ///
    /// `timeout` bounds the whole call. Tasks still running after
    /// `message/send` are polled with `tasks/get` until they reach a
    /// terminal state, the caller's deadline passes or the task deadline
    /// passes, whichever comes first. A connection failure marks the agent
    /// unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Unavailable`] for unreachable agents,
    /// [`AgentError::UnknownSkill`] for skills the card does not list and
    /// [`AgentError::Invocation`] for call-level failures and deadlines.
    pub async fn invoke(
        &self,
        name: &ProviderName,
        skill_id: &str,
        arguments: Value,
        timeout: Duration,
    ) -> AgentResult<ToolOutput> {
        let started = Instant::now();
        let budget = timeout.min(self.inner.settings.agent_task_deadline);
        let deadline = started.checked_add(budget).unwrap_or(started);
        let peer = self.message_peer(name, skill_id).await?;
        let failed = |source: AgentClientError| AgentError::Invocation {
            agent: name.to_string(),
            skill: skill_id.to_owned(),
            source,
        };
        debug!(agent = %name, skill = skill_id, "invoking agent skill");

        let params = SendMessageParams::new(Message::skill_invocation(skill_id, &arguments));
        let sent = match self.inner.client.send_message(&peer, params, budget).await {
            Ok(sent) => sent,
            Err(err) => return Err(self.call_failed(name, err, failed).await),
        };
        let Some(task_id) = sent.pending_task().map(ToOwned::to_owned) else {
            return Ok(sent.into_output());
        };

        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                warn!(agent = %name, skill = skill_id, task = %task_id, "agent task deadline passed");
                return Err(failed(AgentClientError::timeout("tasks/get", budget)));
            }
            tokio::time::sleep(self.inner.settings.agent_poll_interval.min(left)).await;
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                continue;
            }
            let task = match self.inner.client.get_task(&peer, &task_id, left).await {
                Ok(task) => task,
                Err(err) => return Err(self.call_failed(name, err, failed).await),
            };
            if task.status.state.is_terminal() {
                debug!(agent = %name, task = %task_id, state = ?task.status.state, "agent task finished");
                return Ok(task.into_output());
            }
        }
    }

    /// Removes an agent and releases its provider name.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotFound`] for unknown agents.
    pub async fn remove(&self, name: &ProviderName) -> AgentResult<()> {
        let mut agents = self.inner.agents.write().await;
        agents
            .remove(name)
            .ok_or_else(|| AgentError::NotFound(name.to_string()))?;
        self.inner.catalog.release(name)?;
        info!(agent = %name, "agent removed");
        Ok(())
    }

    /// Returns the status of one agent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotFound`] for unknown agents.
    pub async fn status(&self, name: &ProviderName) -> AgentResult<AgentStatus> {
        self.inner
            .agents
            .read()
            .await
            .get(name)
            .map(AgentEntry::status)
            .ok_or_else(|| AgentError::NotFound(name.to_string()))
    }

    /// Returns the status of every agent, ordered by name.
    #[must_use]
    pub async fn statuses(&self) -> Vec<AgentStatus> {
        let mut statuses: Vec<_> = self
            .inner
            .agents
            .read()
            .await
            .values()
            .map(AgentEntry::status)
            .collect();
        statuses.sort_by(|left, right| left.name.cmp(&right.name));
        statuses
    }

    async fn message_peer(&self, name: &ProviderName, skill_id: &str) -> AgentResult<AgentPeer> {
        let agents = self.inner.agents.read().await;
        let entry = agents
            .get(name)
            .ok_or_else(|| AgentError::NotFound(name.to_string()))?;
        let card = entry.card.as_ref().filter(|_| entry.available).ok_or_else(|| {
            AgentError::Unavailable {
                agent: name.to_string(),
                reason: entry
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "agent has not been discovered".to_owned()),
            }
        })?;
        if card.skill(skill_id).is_none() {
            return Err(AgentError::UnknownSkill {
                agent: name.to_string(),
                skill: skill_id.to_owned(),
            });
        }
        Ok(entry.declaration.message_peer(Some(card)))
    }

    async fn call_failed(
        &self,
        name: &ProviderName,
        err: AgentClientError,
        failed: impl FnOnce(AgentClientError) -> AgentError,
    ) -> AgentError {
        if !err.is_connection_failure() {
            warn!(agent = %name, "agent call failed: {err}");
            return failed(err);
        }
        self.mark_unavailable(name, &err).await;
        AgentError::Unavailable {
            agent: name.to_string(),
            reason: err.to_string(),
        }
    }

    async fn mark_unavailable(&self, name: &ProviderName, err: &AgentClientError) {
        let mut agents = self.inner.agents.write().await;
        let Some(entry) = agents.get_mut(name) else {
            return;
        };
        if let Err(catalog_err) = self.inner.catalog.withdraw(name) {
            error!(agent = %name, "withdrawing agent failed: {catalog_err}");
        }
        warn!(agent = %name, "agent connection lost: {err}");
        entry.available = false;
        entry.last_checked = Some(self.inner.clock.utc());
        entry.last_error = Some(err.to_string());
    }
}
