//! In-process transport for tests and embedding.
//!
//! Each backend name maps to a scripted endpoint: its advertised tools,
//! optional per-tool handlers, reachability and simulated latency. Making an
//! endpoint unreachable also breaks every session opened before, which lets
//! callers exercise reconnection without real processes.

use crate::backend::domain::TransportConfig;
use crate::backend::ports::{
    TransportConnector, TransportError, TransportResult, TransportSession,
};
use crate::catalog::domain::{ProviderName, ToolDefinition, ToolOutput};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Scripted tool behaviour.
pub type ToolHandler = Arc<dyn Fn(&Value) -> TransportResult<ToolOutput> + Send + Sync>;

#[derive(Default)]
struct Endpoint {
    tools: Vec<ToolDefinition>,
    handlers: HashMap<String, ToolHandler>,
    unreachable: bool,
    latency: Duration,
    generation: u64,
    connections: usize,
}

type Endpoints = Arc<Mutex<HashMap<ProviderName, Endpoint>>>;

fn lock(endpoints: &Endpoints) -> MutexGuard<'_, HashMap<ProviderName, Endpoint>> {
    endpoints.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connector whose backends live in memory.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    endpoints: Endpoints,
}

impl fmt::Debug for InMemoryTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = lock(&self.endpoints)
            .keys()
            .map(ToString::to_string)
            .collect();
        formatter
            .debug_struct("InMemoryTransport")
            .field("endpoints", &names)
            .finish()
    }
}

impl InMemoryTransport {
    /// Creates a transport with no scripted endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_endpoint<T>(&self, backend: &ProviderName, change: impl FnOnce(&mut Endpoint) -> T) -> T {
        let mut endpoints = lock(&self.endpoints);
        change(endpoints.entry(backend.clone()).or_default())
    }

    /// Sets the tools `backend` advertises.
    pub fn set_tools(&self, backend: &ProviderName, tools: Vec<ToolDefinition>) {
        self.with_endpoint(backend, |endpoint| endpoint.tools = tools);
    }

    /// Scripts the behaviour of one tool.
    ///
    /// Tools without a handler answer with their arguments as text.
    pub fn on_call<F>(&self, backend: &ProviderName, tool: &str, handler: F)
    where
        F: Fn(&Value) -> TransportResult<ToolOutput> + Send + Sync + 'static,
    {
        self.with_endpoint(backend, |endpoint| {
            endpoint.handlers.insert(tool.to_owned(), Arc::new(handler));
        });
    }

    /// Controls whether `backend` accepts connections.
    ///
    /// Making a backend unreachable breaks its open sessions.
    pub fn set_reachable(&self, backend: &ProviderName, reachable: bool) {
        self.with_endpoint(backend, |endpoint| {
            if !reachable && !endpoint.unreachable {
                endpoint.generation = endpoint.generation.wrapping_add(1);
            }
            endpoint.unreachable = !reachable;
        });
    }

    /// Delays every call to `backend` by `latency`.
    pub fn set_latency(&self, backend: &ProviderName, latency: Duration) {
        self.with_endpoint(backend, |endpoint| endpoint.latency = latency);
    }

    /// Returns how many sessions were opened to `backend`.
    #[must_use]
    pub fn connection_count(&self, backend: &ProviderName) -> usize {
        lock(&self.endpoints)
            .get(backend)
            .map_or(0, |endpoint| endpoint.connections)
    }
}

#[async_trait]
impl TransportConnector for InMemoryTransport {
    async fn connect(
        &self,
        backend: &ProviderName,
        _transport: &TransportConfig,
    ) -> TransportResult<Arc<dyn TransportSession>> {
        let generation = self.with_endpoint(backend, |endpoint| {
            if endpoint.unreachable {
                return Err(TransportError::Unreachable(format!(
                    "backend '{backend}' is unreachable"
                )));
            }
            endpoint.connections = endpoint.connections.saturating_add(1);
            Ok(endpoint.generation)
        })?;
        Ok(Arc::new(InMemorySession {
            backend: backend.clone(),
            endpoints: Arc::clone(&self.endpoints),
            generation,
            closed: AtomicBool::new(false),
        }))
    }
}

struct InMemorySession {
    backend: ProviderName,
    endpoints: Endpoints,
    generation: u64,
    closed: AtomicBool,
}

enum Prepared {
    Tools(Vec<ToolDefinition>),
    Call(Option<ToolHandler>),
    Pong,
}

impl InMemorySession {
    async fn prepare(
        &self,
        method: &str,
        timeout: Duration,
        select: impl FnOnce(&Endpoint) -> TransportResult<Prepared>,
    ) -> TransportResult<Prepared> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed("session closed".to_owned()));
        }
        let (latency, prepared) = {
            let endpoints = lock(&self.endpoints);
            let endpoint = endpoints
                .get(&self.backend)
                .filter(|endpoint| !endpoint.unreachable && endpoint.generation == self.generation)
                .ok_or_else(|| {
                    TransportError::ConnectionClosed(format!("backend '{}' went away", self.backend))
                })?;
            (endpoint.latency, select(endpoint))
        };
        if latency > timeout {
            tokio::time::sleep(timeout).await;
            return Err(TransportError::timeout(method, timeout));
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        prepared
    }
}

#[async_trait]
impl TransportSession for InMemorySession {
    async fn list_tools(&self, timeout: Duration) -> TransportResult<Vec<ToolDefinition>> {
        match self
            .prepare("tools/list", timeout, |endpoint| {
                Ok(Prepared::Tools(endpoint.tools.clone()))
            })
            .await?
        {
            Prepared::Tools(tools) => Ok(tools),
            Prepared::Call(_) | Prepared::Pong => Ok(Vec::new()),
        }
    }

    async fn invoke(
        &self,
        tool: &str,
        arguments: Value,
        timeout: Duration,
    ) -> TransportResult<ToolOutput> {
        let prepared = self
            .prepare("tools/call", timeout, |endpoint| {
                if !endpoint.tools.iter().any(|known| known.name() == tool) {
                    return Err(TransportError::Rpc {
                        code: crate::jsonrpc::INVALID_PARAMS,
                        message: format!("unknown tool '{tool}'"),
                    });
                }
                Ok(Prepared::Call(endpoint.handlers.get(tool).cloned()))
            })
            .await?;
        match prepared {
            Prepared::Call(Some(handler)) => handler(&arguments),
            Prepared::Call(None) | Prepared::Tools(_) | Prepared::Pong => {
                Ok(ToolOutput::text(arguments.to_string()))
            }
        }
    }

    async fn ping(&self, timeout: Duration) -> TransportResult<()> {
        self.prepare("ping", timeout, |_| Ok(Prepared::Pong)).await?;
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::domain::InputSchema;
    use serde_json::json;

    fn backend() -> ProviderName {
        ProviderName::new("memory").expect("valid provider")
    }

    fn transport() -> TransportConfig {
        TransportConfig::local_process("unused").expect("valid transport")
    }

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition::new(name, "", InputSchema::object()).expect("valid tool")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scripted_handler_answers_calls() {
        let memory = InMemoryTransport::new();
        memory.set_tools(&backend(), vec![tool("echo")]);
        memory.on_call(&backend(), "echo", |arguments| {
            let text = arguments.get("text").and_then(Value::as_str).unwrap_or_default();
            Ok(ToolOutput::text(format!("Echo: {text}")))
        });

        let session = memory.connect(&backend(), &transport()).await.expect("connect");
        let output = session
            .invoke("echo", json!({"text": "hi"}), Duration::from_secs(1))
            .await
            .expect("invoke");

        assert_eq!(output.joined_text(), "Echo: hi");
        assert_eq!(memory.connection_count(&backend()), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_backend_breaks_sessions_and_refuses_connections() {
        let memory = InMemoryTransport::new();
        memory.set_tools(&backend(), vec![tool("echo")]);
        let session = memory.connect(&backend(), &transport()).await.expect("connect");

        memory.set_reachable(&backend(), false);

        let error = session.ping(Duration::from_secs(1)).await.expect_err("broken");
        assert!(error.is_connection_failure());
        assert!(memory.connect(&backend(), &transport()).await.is_err());

        memory.set_reachable(&backend(), true);
        let fresh = memory.connect(&backend(), &transport()).await.expect("reconnect");
        assert!(fresh.ping(Duration::from_secs(1)).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn latency_beyond_deadline_times_out() {
        let memory = InMemoryTransport::new();
        memory.set_tools(&backend(), vec![tool("slow")]);
        memory.set_latency(&backend(), Duration::from_secs(5));
        let session = memory.connect(&backend(), &transport()).await.expect("connect");

        let error = session
            .invoke("slow", json!({}), Duration::from_millis(20))
            .await
            .expect_err("deadline");

        assert!(matches!(error, TransportError::Timeout { .. }));
        assert!(!error.is_connection_failure());
    }
}
