//! Line-delimited JSON-RPC over the standard streams of a child process.
//!
//! Both the local-process and remote-shell transports end up here: the
//! remote variant simply launches `ssh` with the remote command line. The
//! channel owns the attach process and terminates it on shutdown.

use super::correlation::{Deadline, PendingRequests};
use super::rpc::RpcChannel;
use crate::backend::domain::{LocalProcessConfig, RemoteShellConfig};
use crate::backend::ports::{TransportError, TransportResult};
use crate::catalog::domain::ProviderName;
use crate::jsonrpc::{JsonRpcRequest, parse_response};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const NOTIFY_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Program, arguments and environment for an attach process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProcessLaunch {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_directory: Option<String>,
}

impl ProcessLaunch {
    pub(crate) fn local(config: &LocalProcessConfig) -> Self {
        Self {
            program: config.command().to_owned(),
            args: config.args().to_vec(),
            env: config.env().clone(),
            working_directory: config.working_directory().map(ToOwned::to_owned),
        }
    }

    pub(crate) fn remote(config: &RemoteShellConfig) -> Self {
        Self {
            program: "ssh".to_owned(),
            args: config.ssh_arguments(),
            env: BTreeMap::new(),
            working_directory: None,
        }
    }
}

/// Framed channel over a spawned child process.
pub(crate) struct StdioChannel {
    backend: ProviderName,
    pending: PendingRequests,
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
    reader: JoinHandle<()>,
    kill_grace: Duration,
}

impl StdioChannel {
    /// Spawns the process and starts reading its output.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn(
        backend: ProviderName,
        launch: &ProcessLaunch,
        kill_grace: Duration,
    ) -> TransportResult<Self> {
        let mut command = Command::new(&launch.program);
        command
            .args(&launch.args)
            .envs(&launch.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(directory) = &launch.working_directory {
            command.current_dir(directory);
        }

        let mut child = command.spawn().map_err(|err| {
            TransportError::Unreachable(format!("failed to start '{}': {err}", launch.program))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Unreachable("stdin was not captured".to_owned()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Unreachable("stdout was not captured".to_owned()))?;
        if let Some(stderr) = child.stderr.take() {
            let name = backend.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(backend = %name, "stderr: {line}");
                }
            });
        }

        let pending = PendingRequests::default();
        let reader = tokio::spawn(read_responses(backend.clone(), stdout, pending.clone()));
        debug!(backend = %backend, program = %launch.program, "backend process started");

        Ok(Self {
            backend,
            pending,
            stdin: Mutex::new(Some(stdin)),
            child: Mutex::new(Some(child)),
            reader,
            kill_grace,
        })
    }

    /// Writes one line, waiting for stdin no later than `deadline`.
    async fn write_message(
        &self,
        message: &JsonRpcRequest,
        deadline: Deadline,
    ) -> TransportResult<()> {
        let mut payload =
            serde_json::to_vec(message).map_err(|err| TransportError::Protocol(err.to_string()))?;
        payload.push(b'\n');

        let write = async {
            let mut guard = self.stdin.lock().await;
            let stdin = guard
                .as_mut()
                .ok_or_else(|| TransportError::ConnectionClosed("stdin closed".to_owned()))?;
            let written = async {
                stdin.write_all(&payload).await?;
                stdin.flush().await
            };
            written
                .await
                .map_err(|err| TransportError::ConnectionClosed(format!("write failed: {err}")))
        };
        tokio::time::timeout_at(deadline.at(), write)
            .await
            .map_err(|_| deadline.expired(&message.method))?
    }
}

async fn read_responses(
    backend: ProviderName,
    stdout: tokio::process::ChildStdout,
    pending: PendingRequests,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match parse_response(&line) {
                    Some(response) => {
                        if !pending.resolve(response) {
                            debug!(backend = %backend, "dropping response nobody waits for");
                        }
                    }
                    None => debug!(backend = %backend, "ignoring non-response output line"),
                }
            }
            Ok(None) => {
                pending.close("backend process closed its output");
                return;
            }
            Err(err) => {
                pending.close(&format!("reading backend output failed: {err}"));
                return;
            }
        }
    }
}

#[async_trait]
impl RpcChannel for StdioChannel {
    async fn request(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> TransportResult<Value> {
        let deadline = Deadline::after(timeout);
        let call = self.pending.register()?;
        let request = JsonRpcRequest::new(call.id(), method, Some(params));
        self.write_message(&request, deadline).await?;
        call.wait(method, deadline).await
    }

    async fn notify(&self, method: &str, params: Value) -> TransportResult<()> {
        let notification = JsonRpcRequest::notification(method, Some(params));
        self.write_message(&notification, Deadline::after(NOTIFY_WRITE_TIMEOUT))
            .await
    }

    async fn shutdown(&self) {
        drop(self.stdin.lock().await.take());
        let child = self.child.lock().await.take();
        if let Some(mut process) = child {
            terminate(&mut process, self.kill_grace, &self.backend).await;
        }
        self.pending.close("session closed");
        self.reader.abort();
    }
}

impl Drop for StdioChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn terminate(child: &mut Child, grace: Duration, backend: &ProviderName) {
    if matches!(child.try_wait(), Ok(Some(_))) {
        return;
    }
    request_exit(child, backend);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => debug!(backend = %backend, %status, "backend process exited"),
        Ok(Err(err)) => warn!(backend = %backend, "waiting for backend process failed: {err}"),
        Err(_) => {
            warn!(backend = %backend, "backend process ignored termination; killing");
            if let Err(err) = child.kill().await {
                warn!(backend = %backend, "killing backend process failed: {err}");
            }
        }
    }
}

#[cfg(unix)]
fn request_exit(child: &Child, backend: &ProviderName) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(raw) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        debug!(backend = %backend, "SIGTERM failed: {err}");
    }
}

#[cfg(not(unix))]
fn request_exit(_child: &Child, _backend: &ProviderName) {}
