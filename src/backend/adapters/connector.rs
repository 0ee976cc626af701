//! Connector dispatching on the configured transport kind.

use super::event_stream::EventStreamChannel;
use super::http::HttpChannel;
use super::rpc::{ClientIdentity, McpSession, RpcChannel};
use super::stdio::{ProcessLaunch, StdioChannel};
use crate::backend::domain::TransportConfig;
use crate::backend::ports::{TransportConnector, TransportResult, TransportSession};
use crate::catalog::domain::ProviderName;
use crate::settings::GatewaySettings;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Opens real process pipes, SSH tunnels and HTTP connections.
#[derive(Debug, Clone)]
pub struct NetworkTransportConnector {
    client: reqwest::Client,
    identity: ClientIdentity,
    handshake_timeout: Duration,
    kill_grace: Duration,
}

impl NetworkTransportConnector {
    /// Creates a connector announcing the gateway identity from `settings`.
    #[must_use]
    pub fn new(settings: &GatewaySettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            identity: ClientIdentity {
                name: settings.server_name.clone(),
                version: settings.server_version.clone(),
            },
            handshake_timeout: settings.handshake_timeout,
            kill_grace: settings.process_kill_grace,
        }
    }

    async fn establish<C: RpcChannel + 'static>(
        &self,
        backend: &ProviderName,
        channel: C,
    ) -> TransportResult<Arc<dyn TransportSession>> {
        let session = McpSession::establish(
            backend.clone(),
            channel,
            &self.identity,
            self.handshake_timeout,
        )
        .await?;
        Ok(Arc::new(session))
    }
}

#[async_trait]
impl TransportConnector for NetworkTransportConnector {
    async fn connect(
        &self,
        backend: &ProviderName,
        transport: &TransportConfig,
    ) -> TransportResult<Arc<dyn TransportSession>> {
        match transport {
            TransportConfig::LocalProcess(config) => {
                let launch = ProcessLaunch::local(config);
                let channel = StdioChannel::spawn(backend.clone(), &launch, self.kill_grace)?;
                self.establish(backend, channel).await
            }
            TransportConfig::RemoteShell(config) => {
                let launch = ProcessLaunch::remote(config);
                let channel = StdioChannel::spawn(backend.clone(), &launch, self.kill_grace)?;
                self.establish(backend, channel).await
            }
            TransportConfig::Http(config) => {
                let channel = HttpChannel::new(backend.clone(), self.client.clone(), config.url());
                self.establish(backend, channel).await
            }
            TransportConfig::EventStream(config) => {
                let channel = EventStreamChannel::open(
                    backend.clone(),
                    self.client.clone(),
                    config.url(),
                    self.handshake_timeout,
                )
                .await?;
                self.establish(backend, channel).await
            }
        }
    }
}
