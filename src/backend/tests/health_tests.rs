//! Health checking against mocked sessions.

use super::registry_tests::{declaration, fast_settings, name, tool};
use crate::backend::domain::{BackendState, HealthStatus, TransportConfig};
use crate::backend::ports::{
    MockTransportSession, TransportConnector, TransportError, TransportResult, TransportSession,
};
use crate::backend::services::BackendRegistry;
use crate::catalog::domain::ProviderName;
use crate::catalog::services::CatalogAggregator;
use async_trait::async_trait;
use mockable::DefaultClock;
use rstest::rstest;
use std::sync::{Arc, Mutex};

struct ScriptedConnector {
    sessions: Mutex<Vec<Arc<dyn TransportSession>>>,
}

impl ScriptedConnector {
    fn new(sessions: Vec<MockTransportSession>) -> Self {
        Self {
            sessions: Mutex::new(
                sessions
                    .into_iter()
                    .rev()
                    .map(|session| Arc::new(session) as Arc<dyn TransportSession>)
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl TransportConnector for ScriptedConnector {
    async fn connect(
        &self,
        backend: &ProviderName,
        _transport: &TransportConfig,
    ) -> TransportResult<Arc<dyn TransportSession>> {
        self.sessions
            .lock()
            .expect("sessions lock")
            .pop()
            .ok_or_else(|| TransportError::Unreachable(format!("no session scripted for {backend}")))
    }
}

fn session_with_ping(ping: TransportResult<()>) -> MockTransportSession {
    let mut session = MockTransportSession::new();
    session
        .expect_list_tools()
        .returning(|_| Ok(vec![tool("echo")]));
    session.expect_ping().return_once(move |_| ping);
    session.expect_close().returning(|| ());
    session
}

fn registry(connector: ScriptedConnector) -> (Arc<CatalogAggregator>, BackendRegistry<DefaultClock>) {
    let catalog = Arc::new(CatalogAggregator::new());
    let registry = BackendRegistry::new(
        Arc::new(connector),
        Arc::clone(&catalog),
        Arc::new(DefaultClock),
        fast_settings(),
    );
    (catalog, registry)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn successful_ping_marks_backend_healthy() {
    let (_, backends) = registry(ScriptedConnector::new(vec![session_with_ping(Ok(()))]));
    backends.add(declaration("calc")).await.expect("add");

    backends.check_health().await;

    let status = backends.status(&name("calc")).await.expect("status");
    assert_eq!(status.state, BackendState::Initialized);
    assert_eq!(status.health.status(), HealthStatus::Healthy);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ping_timeout_is_unhealthy_but_connected() {
    let timeout = TransportError::Timeout {
        method: "ping".to_owned(),
        timeout_ms: 10,
    };
    let (catalog, backends) = registry(ScriptedConnector::new(vec![session_with_ping(Err(timeout))]));
    backends.add(declaration("calc")).await.expect("add");

    backends.check_health().await;

    let status = backends.status(&name("calc")).await.expect("status");
    assert_eq!(status.state, BackendState::Initialized);
    assert_eq!(status.health.status(), HealthStatus::Unhealthy);
    assert!(catalog.snapshot().contains("calc__echo"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn lost_connection_on_ping_degrades_backend() {
    let closed = TransportError::ConnectionClosed("pipe closed".to_owned());
    let (catalog, backends) = registry(ScriptedConnector::new(vec![session_with_ping(Err(closed))]));
    backends.add(declaration("calc")).await.expect("add");

    backends.check_health().await;

    let status = backends.status(&name("calc")).await.expect("status");
    assert_ne!(status.state, BackendState::Initialized);
    assert_eq!(status.health.status(), HealthStatus::Unhealthy);
    assert!(!catalog.snapshot().has_provider(&name("calc")));
}
