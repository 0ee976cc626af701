//! Connection lifecycle for every configured backend.
//!
//! The registry owns one session per backend and keeps the catalog in step
//! with connection state: a backend contributes tools only while it is
//! `initialized`. Every catalog publication happens under the entries write
//! lock, and each connection attempt carries a generation number so that a
//! result arriving after a reconfiguration is discarded instead of
//! published.

use crate::backend::domain::{
    BackendDeclaration, BackendDomainError, BackendState, HealthSnapshot, TransportConfig,
    TransportKind,
};
use crate::backend::ports::{TransportConnector, TransportError, TransportSession};
use crate::catalog::domain::{ProviderContribution, ProviderKind, ProviderName, ToolDefinition, ToolOutput};
use crate::catalog::services::{CatalogAggregator, CatalogError};
use crate::settings::GatewaySettings;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, join_all};
use mockable::Clock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Errors returned by backend registry operations.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The declaration is invalid.
    #[error(transparent)]
    Domain(#[from] BackendDomainError),

    /// The catalog rejected the backend name or contribution.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A backend with this name already exists.
    #[error("backend '{0}' is already registered")]
    AlreadyRegistered(String),

    /// No backend with this name exists.
    #[error("backend '{0}' is not registered")]
    NotFound(String),

    /// The backend cannot serve calls right now.
    #[error("backend '{backend}' is unavailable: {reason}")]
    Unavailable {
        /// Backend name.
        backend: String,
        /// Connection failure or current state.
        reason: String,
    },

    /// The backend was reachable but the call failed.
    #[error("tool '{tool}' on backend '{backend}' failed: {source}")]
    Invocation {
        /// Backend name.
        backend: String,
        /// Provider-local tool name.
        tool: String,
        /// Call-level transport failure.
        #[source]
        source: TransportError,
    },
}

/// Result type for backend registry operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Point-in-time status of one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    /// Backend name.
    pub name: ProviderName,
    /// Transport kind.
    pub transport: TransportKind,
    /// Where the backend is reached.
    pub endpoint: String,
    /// Connection state.
    pub state: BackendState,
    /// Number of tools exposed after server-level filtering.
    pub exposed_tools: usize,
    /// Consecutive failed connection attempts.
    pub failed_attempts: u32,
    /// Last connection or health failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Allow-list entries the backend does not advertise.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter_mismatches: Vec<String>,
    /// Time of the last successful handshake.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    /// Most recent health check.
    pub health: HealthSnapshot,
}

struct BackendEntry {
    declaration: BackendDeclaration,
    state: BackendState,
    session: Option<Arc<dyn TransportSession>>,
    tools: Vec<ToolDefinition>,
    health: HealthSnapshot,
    attempts: u32,
    generation: u64,
    last_error: Option<String>,
    connected_at: Option<DateTime<Utc>>,
    reconnect: Option<JoinHandle<()>>,
}

impl BackendEntry {
    fn transition(&mut self, target: BackendState) -> Result<(), BackendDomainError> {
        if !self.state.can_transition_to(target) {
            return Err(BackendDomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        if self.state != target {
            info!(
                backend = %self.declaration.name,
                from = %self.state,
                to = %target,
                "backend state changed"
            );
        }
        self.state = target;
        Ok(())
    }

    fn exposed(&self) -> Vec<ToolDefinition> {
        self.declaration.tool_filter.apply(&self.tools)
    }

    fn cancel_reconnect(&mut self) {
        if let Some(handle) = self.reconnect.take() {
            handle.abort();
        }
    }

    fn reconnect_pending(&self) -> bool {
        self.reconnect
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn status(&self) -> BackendStatus {
        let exposed_tools = if self.state.is_catalog_visible() {
            self.exposed().len()
        } else {
            0
        };
        BackendStatus {
            name: self.declaration.name.clone(),
            transport: self.declaration.transport.kind(),
            endpoint: self.declaration.transport.endpoint(),
            state: self.state,
            exposed_tools,
            failed_attempts: self.attempts,
            last_error: self.last_error.clone(),
            filter_mismatches: self.declaration.tool_filter.unmatched(&self.tools),
            connected_at: self.connected_at,
            health: self.health.clone(),
        }
    }
}

struct Inner<C> {
    connector: Arc<dyn TransportConnector>,
    catalog: Arc<CatalogAggregator>,
    clock: Arc<C>,
    settings: GatewaySettings,
    entries: RwLock<HashMap<ProviderName, BackendEntry>>,
}

/// Registry of configured backends and their live sessions.
pub struct BackendRegistry<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for BackendRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> BackendRegistry<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates an empty registry publishing into `catalog`.
    #[must_use]
    pub fn new(
        connector: Arc<dyn TransportConnector>,
        catalog: Arc<CatalogAggregator>,
        clock: Arc<C>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                catalog,
                clock,
                settings,
                entries: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Registers a backend and makes the first connection attempt.
    ///
    /// A failed first attempt is not an error: the backend is left
    /// `degraded` and retried in the background.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the declaration is invalid, the name is
    /// taken, or the catalog rejects the name.
    pub async fn add(&self, declaration: BackendDeclaration) -> BackendResult<BackendStatus> {
        declaration.validate()?;
        let name = declaration.name.clone();
        {
            let mut entries = self.inner.entries.write().await;
            if entries.contains_key(&name) {
                return Err(BackendError::AlreadyRegistered(name.to_string()));
            }
            self.inner.catalog.reserve(&name, ProviderKind::Backend)?;
            debug!(
                backend = %name,
                transport = %declaration.transport.kind(),
                "registering backend"
            );
            entries.insert(
                name.clone(),
                BackendEntry {
                    declaration,
                    state: BackendState::Connecting,
                    session: None,
                    tools: Vec::new(),
                    health: HealthSnapshot::unknown(self.inner.clock.utc()),
                    attempts: 0,
                    generation: 0,
                    last_error: None,
                    connected_at: None,
                    reconnect: None,
                },
            );
        }
        self.attempt(&name, 0).await;
        self.status(&name).await
    }

    /// Applies a new endpoint for a backend and reconnects immediately.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] for unknown backends and
    /// validation errors for the transport.
    pub async fn endpoint_available(
        &self,
        name: &ProviderName,
        transport: TransportConfig,
    ) -> BackendResult<BackendStatus> {
        transport.validate()?;
        info!(backend = %name, endpoint = %transport.endpoint(), "backend endpoint available");
        self.restart(name, Some(transport)).await
    }

    /// Drops the current session and reconnects, resetting the backoff.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] for unknown backends.
    pub async fn reconnect(&self, name: &ProviderName) -> BackendResult<BackendStatus> {
        self.restart(name, None).await
    }

    async fn restart(
        &self,
        name: &ProviderName,
        transport: Option<TransportConfig>,
    ) -> BackendResult<BackendStatus> {
        let (previous, generation) = {
            let mut entries = self.inner.entries.write().await;
            let entry = entries
                .get_mut(name)
                .ok_or_else(|| BackendError::NotFound(name.to_string()))?;
            if entry.state != BackendState::Connecting {
                entry.transition(BackendState::Connecting)?;
            }
            if let Some(config) = transport {
                entry.declaration.transport = config;
            }
            entry.cancel_reconnect();
            entry.generation = entry.generation.wrapping_add(1);
            entry.attempts = 0;
            entry.tools.clear();
            self.inner.catalog.withdraw(name)?;
            (entry.session.take(), entry.generation)
        };
        if let Some(session) = previous {
            session.close().await;
        }
        self.attempt(name, generation).await;
        self.status(name).await
    }

    /// Re-lists the tools of an initialized backend and republishes them.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] when the backend is not
    /// initialized or the listing fails at connection level.
    pub async fn refresh_tools(&self, name: &ProviderName) -> BackendResult<BackendStatus> {
        let (session, generation) = self.live_session(name).await?;
        match session.list_tools(self.inner.settings.invocation_timeout).await {
            Ok(tools) => {
                let mut entries = self.inner.entries.write().await;
                if let Some(entry) = entries
                    .get_mut(name)
                    .filter(|entry| entry.generation == generation)
                {
                    warn_unmatched(entry, &tools);
                    entry.tools = tools;
                    if entry.state.is_catalog_visible() {
                        self.inner.catalog.publish(ProviderContribution::new(
                            name.clone(),
                            ProviderKind::Backend,
                            entry.exposed(),
                        ))?;
                    }
                }
            }
            Err(err) if err.is_connection_failure() => {
                self.mark_degraded(name, generation, &session, &err).await;
                return Err(unavailable(name, &err));
            }
            Err(err) => {
                return Err(BackendError::Invocation {
                    backend: name.to_string(),
                    tool: "tools/list".to_owned(),
                    source: err,
                });
            }
        }
        self.status(name).await
    }

    /// Closes a backend, keeping its entry for status reporting.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] for unknown backends.
    pub async fn disconnect(&self, name: &ProviderName) -> BackendResult<BackendStatus> {
        let previous = {
            let mut entries = self.inner.entries.write().await;
            let entry = entries
                .get_mut(name)
                .ok_or_else(|| BackendError::NotFound(name.to_string()))?;
            entry.transition(BackendState::Closed)?;
            entry.cancel_reconnect();
            entry.generation = entry.generation.wrapping_add(1);
            self.inner.catalog.withdraw(name)?;
            entry.session.take()
        };
        if let Some(session) = previous {
            session.close().await;
        }
        self.status(name).await
    }

    /// Removes a backend entirely, cancelling any pending reconnection.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] for unknown backends.
    pub async fn tear_down(&self, name: &ProviderName) -> BackendResult<()> {
        let removed = {
            let mut entries = self.inner.entries.write().await;
            let mut entry = entries
                .remove(name)
                .ok_or_else(|| BackendError::NotFound(name.to_string()))?;
            entry.cancel_reconnect();
            self.inner.catalog.release(name)?;
            entry.session.take()
        };
        info!(backend = %name, "backend torn down");
        if let Some(session) = removed {
            session.close().await;
        }
        Ok(())
    }

    /// Invokes a provider-local tool on an initialized backend.
    ///
    /// A connection-level failure degrades the backend and schedules a
    /// reconnection; the call itself is not retried.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] for connection-level failures
    /// and [`BackendError::Invocation`] for call-level failures, timeouts
    /// included.
    pub async fn invoke(
        &self,
        name: &ProviderName,
        tool: &str,
        arguments: Value,
        timeout: Duration,
    ) -> BackendResult<ToolOutput> {
        let (session, generation) = self.live_session(name).await?;
        debug!(backend = %name, tool, "invoking backend tool");
        match session.invoke(tool, arguments, timeout).await {
            Ok(output) => Ok(output),
            Err(err) if err.is_connection_failure() => {
                self.mark_degraded(name, generation, &session, &err).await;
                Err(unavailable(name, &err))
            }
            Err(err) => {
                warn!(backend = %name, tool, "tool call failed: {err}");
                Err(BackendError::Invocation {
                    backend: name.to_string(),
                    tool: tool.to_owned(),
                    source: err,
                })
            }
        }
    }

    /// Pings every initialized backend and records the outcome.
    ///
    /// Backends whose ping fails at connection level are degraded.
    pub async fn check_health(&self) {
        let live: Vec<_> = {
            let entries = self.inner.entries.read().await;
            entries
                .iter()
                .filter_map(|(name, entry)| {
                    entry
                        .session
                        .as_ref()
                        .filter(|_| entry.state == BackendState::Initialized)
                        .map(|session| (name.clone(), entry.generation, Arc::clone(session)))
                })
                .collect()
        };
        let timeout = self.inner.settings.invocation_timeout;
        let checks = live.into_iter().map(|(name, generation, session)| async move {
            let result = session.ping(timeout).await;
            (name, generation, session, result)
        });
        for (name, generation, session, result) in join_all(checks).await {
            match result {
                Ok(()) => {
                    self.record_health(&name, generation, HealthSnapshot::healthy(self.inner.clock.utc()))
                        .await;
                }
                Err(err) if err.is_connection_failure() => {
                    self.mark_degraded(&name, generation, &session, &err).await;
                }
                Err(err) => {
                    warn!(backend = %name, "health check failed: {err}");
                    self.record_health(
                        &name,
                        generation,
                        HealthSnapshot::unhealthy(self.inner.clock.utc(), err.to_string()),
                    )
                    .await;
                }
            }
        }
    }

    /// Runs [`Self::check_health`] every `interval` until aborted.
    #[must_use]
    pub fn spawn_health_monitor(&self, interval: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                registry.check_health().await;
            }
        })
    }

    /// Returns the status of one backend.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] for unknown backends.
    pub async fn status(&self, name: &ProviderName) -> BackendResult<BackendStatus> {
        self.inner
            .entries
            .read()
            .await
            .get(name)
            .map(BackendEntry::status)
            .ok_or_else(|| BackendError::NotFound(name.to_string()))
    }

    /// Returns the status of every backend, ordered by name.
    #[must_use]
    pub async fn statuses(&self) -> Vec<BackendStatus> {
        let mut statuses: Vec<_> = self
            .inner
            .entries
            .read()
            .await
            .values()
            .map(BackendEntry::status)
            .collect();
        statuses.sort_by(|left, right| left.name.cmp(&right.name));
        statuses
    }

    /// Closes every backend and cancels all reconnection.
    pub async fn shutdown(&self) {
        let sessions: Vec<_> = {
            let mut entries = self.inner.entries.write().await;
            entries
                .iter_mut()
                .filter_map(|(name, entry)| {
                    entry.cancel_reconnect();
                    entry.generation = entry.generation.wrapping_add(1);
                    if let Err(err) = entry.transition(BackendState::Closed) {
                        warn!(backend = %name, "{err}");
                    }
                    if let Err(err) = self.inner.catalog.withdraw(name) {
                        error!(backend = %name, "withdrawing backend failed: {err}");
                    }
                    entry.session.take()
                })
                .collect()
        };
        join_all(sessions.iter().map(|session| session.close())).await;
        info!(closed = sessions.len(), "backend registry shut down");
    }

    async fn live_session(
        &self,
        name: &ProviderName,
    ) -> BackendResult<(Arc<dyn TransportSession>, u64)> {
        let entries = self.inner.entries.read().await;
        let entry = entries
            .get(name)
            .ok_or_else(|| BackendError::NotFound(name.to_string()))?;
        match (&entry.session, entry.state) {
            (Some(session), BackendState::Initialized) => {
                Ok((Arc::clone(session), entry.generation))
            }
            (_, state) => Err(BackendError::Unavailable {
                backend: name.to_string(),
                reason: format!("backend is {state}"),
            }),
        }
    }

    async fn record_health(&self, name: &ProviderName, generation: u64, health: HealthSnapshot) {
        let mut entries = self.inner.entries.write().await;
        if let Some(entry) = entries
            .get_mut(name)
            .filter(|entry| entry.generation == generation)
        {
            entry.health = health;
        }
    }

    /// Connects and lists tools, publishing the result if `generation` is
    /// still current.
    ///
    /// Returns `Some(true)` on success, `Some(false)` on failure and `None`
    /// when the entry was removed or reconfigured meanwhile.
    async fn attempt(&self, name: &ProviderName, generation: u64) -> Option<bool> {
        let transport = {
            let entries = self.inner.entries.read().await;
            entries
                .get(name)
                .filter(|entry| entry.generation == generation)
                .map(|entry| entry.declaration.transport.clone())?
        };

        let result = async {
            let session = self.inner.connector.connect(name, &transport).await?;
            match session.list_tools(self.inner.settings.invocation_timeout).await {
                Ok(tools) => Ok((session, tools)),
                Err(err) => {
                    session.close().await;
                    Err(err)
                }
            }
        }
        .await;

        let mut entries = self.inner.entries.write().await;
        let current = entries.get(name).is_some_and(|entry| {
            entry.generation == generation && entry.state == BackendState::Connecting
        });
        if !current {
            drop(entries);
            if let Ok((stale, _)) = result {
                debug!(backend = %name, "discarding connection from a superseded attempt");
                stale.close().await;
            }
            return None;
        }
        let entry = entries.get_mut(name)?;

        match result {
            Ok((session, tools)) => {
                if let Err(err) = entry.transition(BackendState::Initialized) {
                    warn!(backend = %name, "{err}");
                    return None;
                }
                warn_unmatched(entry, &tools);
                let now = self.inner.clock.utc();
                entry.session = Some(session);
                entry.tools = tools;
                entry.attempts = 0;
                entry.last_error = None;
                entry.connected_at = Some(now);
                entry.health = HealthSnapshot::healthy(now);
                let contribution =
                    ProviderContribution::new(name.clone(), ProviderKind::Backend, entry.exposed());
                if let Err(err) = self.inner.catalog.publish(contribution) {
                    error!(backend = %name, "publishing backend tools failed: {err}");
                }
                info!(backend = %name, tools = entry.tools.len(), "backend connected");
                Some(true)
            }
            Err(err) => {
                if let Err(transition_err) = entry.transition(BackendState::Degraded) {
                    warn!(backend = %name, "{transition_err}");
                    return None;
                }
                entry.attempts = entry.attempts.saturating_add(1);
                entry.last_error = Some(err.to_string());
                entry.health = HealthSnapshot::unhealthy(self.inner.clock.utc(), err.to_string());
                warn!(
                    backend = %name,
                    attempt = entry.attempts,
                    "backend connection failed: {err}"
                );
                self.schedule_reconnect(name, entry);
                Some(false)
            }
        }
    }

    async fn mark_degraded(
        &self,
        name: &ProviderName,
        generation: u64,
        failed: &Arc<dyn TransportSession>,
        err: &TransportError,
    ) {
        let stale = {
            let mut entries = self.inner.entries.write().await;
            let Some(entry) = entries.get_mut(name).filter(|entry| {
                entry.generation == generation
                    && entry
                        .session
                        .as_ref()
                        .is_some_and(|current| Arc::ptr_eq(current, failed))
            }) else {
                return;
            };
            if let Err(transition_err) = entry.transition(BackendState::Degraded) {
                warn!(backend = %name, "{transition_err}");
                return;
            }
            if let Err(catalog_err) = self.inner.catalog.withdraw(name) {
                error!(backend = %name, "withdrawing backend failed: {catalog_err}");
            }
            entry.attempts = entry.attempts.saturating_add(1);
            entry.last_error = Some(err.to_string());
            entry.health = HealthSnapshot::unhealthy(self.inner.clock.utc(), err.to_string());
            warn!(backend = %name, "backend connection lost: {err}");
            self.schedule_reconnect(name, entry);
            entry.session.take()
        };
        if let Some(session) = stale {
            session.close().await;
        }
    }

    fn schedule_reconnect(&self, name: &ProviderName, entry: &mut BackendEntry) {
        if entry.reconnect_pending() {
            return;
        }
        entry.reconnect = Some(tokio::spawn(
            self.clone().reconnect_loop(name.clone(), entry.generation),
        ));
    }

    fn reconnect_loop(self, name: ProviderName, generation: u64) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            loop {
                let Some(delay) = self.next_delay(&name, generation).await else {
                    return;
                };
                debug!(backend = %name, delay_ms = delay.as_millis(), "reconnect scheduled");
                tokio::time::sleep(delay).await;
                if !self.begin_retry(&name, generation).await {
                    return;
                }
                if self.attempt(&name, generation).await != Some(false) {
                    return;
                }
            }
        })
    }

    async fn next_delay(&self, name: &ProviderName, generation: u64) -> Option<Duration> {
        let entries = self.inner.entries.read().await;
        let entry = entries
            .get(name)
            .filter(|entry| entry.generation == generation && entry.state == BackendState::Degraded)?;
        let backoff = &self.inner.settings.reconnect;
        let retry = entry.attempts.saturating_sub(1);
        if !backoff.allows(retry) {
            error!(backend = %name, attempts = entry.attempts, "giving up on backend");
            return None;
        }
        Some(backoff.delay_for(retry))
    }

    async fn begin_retry(&self, name: &ProviderName, generation: u64) -> bool {
        let mut entries = self.inner.entries.write().await;
        entries
            .get_mut(name)
            .filter(|entry| entry.generation == generation && entry.state == BackendState::Degraded)
            .is_some_and(|entry| entry.transition(BackendState::Connecting).is_ok())
    }
}

fn unavailable(name: &ProviderName, err: &TransportError) -> BackendError {
    BackendError::Unavailable {
        backend: name.to_string(),
        reason: err.to_string(),
    }
}

fn warn_unmatched(entry: &BackendEntry, tools: &[ToolDefinition]) {
    let unmatched = entry.declaration.tool_filter.unmatched(tools);
    if !unmatched.is_empty() {
        warn!(
            backend = %entry.declaration.name,
            ?unmatched,
            "tool filter names tools the backend does not advertise"
        );
    }
}
