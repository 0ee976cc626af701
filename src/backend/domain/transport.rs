//! Backend transport configuration value objects.

use super::BackendDomainError;
use crate::shell::shell_command;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Local child process speaking line-delimited JSON-RPC over stdio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalProcessConfig {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    working_directory: Option<String>,
}

impl LocalProcessConfig {
    /// Creates a process configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BackendDomainError::EmptyCommand`] when `command` is empty
    /// after trimming.
    pub fn new(command: impl Into<String>) -> Result<Self, BackendDomainError> {
        let normalized_command = command.into().trim().to_owned();
        if normalized_command.is_empty() {
            return Err(BackendDomainError::EmptyCommand);
        }

        Ok(Self {
            command: normalized_command,
            args: Vec::new(),
            env: BTreeMap::new(),
            working_directory: None,
        })
    }

    /// Replaces command-line arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = values.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces process environment variables.
    #[must_use]
    pub fn with_env(mut self, values: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env = values.into_iter().collect();
        self
    }

    /// Sets an explicit working directory.
    ///
    /// # Errors
    ///
    /// Returns [`BackendDomainError::EmptyWorkingDirectory`] when the value is
    /// empty after trimming.
    pub fn with_working_directory(
        mut self,
        value: impl Into<String>,
    ) -> Result<Self, BackendDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(BackendDomainError::EmptyWorkingDirectory);
        }

        self.working_directory = Some(normalized);
        Ok(self)
    }

    /// Returns the executable command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns command-line arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns environment variables.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Returns the optional working directory.
    #[must_use]
    pub fn working_directory(&self) -> Option<&str> {
        self.working_directory.as_deref()
    }

    fn validate(&self) -> Result<(), BackendDomainError> {
        if self.command.trim().is_empty() {
            return Err(BackendDomainError::EmptyCommand);
        }
        if self
            .working_directory
            .as_deref()
            .is_some_and(|value| value.trim().is_empty())
        {
            return Err(BackendDomainError::EmptyWorkingDirectory);
        }
        Ok(())
    }
}

/// Process on a remote host reached through `ssh`, speaking stdio JSON-RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteShellConfig {
    host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity_file: Option<String>,
    command: String,
    #[serde(default)]
    args: Vec<String>,
}

impl RemoteShellConfig {
    /// Creates a remote shell configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BackendDomainError`] when `host` or `command` is empty.
    pub fn new(
        host: impl Into<String>,
        command: impl Into<String>,
    ) -> Result<Self, BackendDomainError> {
        let normalized_host = host.into().trim().to_owned();
        if normalized_host.is_empty() {
            return Err(BackendDomainError::EmptyHost);
        }
        let normalized_command = command.into().trim().to_owned();
        if normalized_command.is_empty() {
            return Err(BackendDomainError::EmptyCommand);
        }

        Ok(Self {
            host: normalized_host,
            user: None,
            port: None,
            identity_file: None,
            command: normalized_command,
            args: Vec::new(),
        })
    }

    /// Sets the login user.
    ///
    /// # Errors
    ///
    /// Returns [`BackendDomainError::EmptyUser`] when the value is empty after
    /// trimming.
    pub fn with_user(mut self, user: impl Into<String>) -> Result<Self, BackendDomainError> {
        let normalized = user.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(BackendDomainError::EmptyUser);
        }
        self.user = Some(normalized);
        Ok(self)
    }

    /// Sets a non-default SSH port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the identity file passed with `-i`.
    #[must_use]
    pub fn with_identity_file(mut self, path: impl Into<String>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Replaces the remote command arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = values.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the remote host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the remote command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the local `ssh` argument vector.
    ///
    /// Host keys are accepted on first use and password prompts are
    /// disabled so that a missing key fails fast instead of blocking.
    #[must_use]
    pub fn ssh_arguments(&self) -> Vec<String> {
        let mut arguments = vec![
            "-o".to_owned(),
            "BatchMode=yes".to_owned(),
            "-o".to_owned(),
            "StrictHostKeyChecking=accept-new".to_owned(),
        ];
        if let Some(identity_file) = &self.identity_file {
            arguments.push("-i".to_owned());
            arguments.push(identity_file.clone());
        }
        if let Some(port) = self.port {
            arguments.push("-p".to_owned());
            arguments.push(port.to_string());
        }
        arguments.push(match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        });
        arguments.push(shell_command(&self.command, &self.args));
        arguments
    }

    fn validate(&self) -> Result<(), BackendDomainError> {
        if self.host.trim().is_empty() {
            return Err(BackendDomainError::EmptyHost);
        }
        if self.command.trim().is_empty() {
            return Err(BackendDomainError::EmptyCommand);
        }
        if self.user.as_deref().is_some_and(|user| user.trim().is_empty()) {
            return Err(BackendDomainError::EmptyUser);
        }
        Ok(())
    }
}

fn validate_url(url: &str) -> Result<(), BackendDomainError> {
    if url.is_empty() {
        return Err(BackendDomainError::EmptyUrl);
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(BackendDomainError::InvalidUrl(url.to_owned()));
    }
    Ok(())
}

/// JSON-RPC over one HTTP POST per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpTransportConfig {
    url: String,
}

impl HttpTransportConfig {
    /// Creates an HTTP transport configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BackendDomainError`] when `url` is empty or not HTTP(S).
    pub fn new(url: impl Into<String>) -> Result<Self, BackendDomainError> {
        let normalized = url.into().trim().to_owned();
        validate_url(&normalized)?;
        Ok(Self { url: normalized })
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// JSON-RPC over a long-lived event stream plus a message endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStreamTransportConfig {
    url: String,
}

impl EventStreamTransportConfig {
    /// Creates an event-stream transport configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BackendDomainError`] when `url` is empty or not HTTP(S).
    pub fn new(url: impl Into<String>) -> Result<Self, BackendDomainError> {
        let normalized = url.into().trim().to_owned();
        validate_url(&normalized)?;
        Ok(Self { url: normalized })
    }

    /// Returns the stream URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Discriminant of [`TransportConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Local process pipe.
    LocalProcess,
    /// Remote shell-tunneled process pipe.
    RemoteShell,
    /// HTTP request/response.
    Http,
    /// HTTP long-lived event stream.
    EventStream,
}

impl TransportKind {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LocalProcess => "local_process",
            Self::RemoteShell => "remote_shell",
            Self::Http => "http",
            Self::EventStream => "event_stream",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Supported backend transport configurations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "config")]
pub enum TransportConfig {
    /// Local process over stdio.
    LocalProcess(LocalProcessConfig),
    /// Remote process over `ssh` stdio.
    RemoteShell(RemoteShellConfig),
    /// HTTP request/response.
    Http(HttpTransportConfig),
    /// HTTP event stream.
    EventStream(EventStreamTransportConfig),
}

impl TransportConfig {
    /// Creates a `local_process` transport.
    ///
    /// # Errors
    ///
    /// Returns validation errors from [`LocalProcessConfig::new`].
    pub fn local_process(command: impl Into<String>) -> Result<Self, BackendDomainError> {
        Ok(Self::LocalProcess(LocalProcessConfig::new(command)?))
    }

    /// Creates an `http` transport.
    ///
    /// # Errors
    ///
    /// Returns validation errors from [`HttpTransportConfig::new`].
    pub fn http(url: impl Into<String>) -> Result<Self, BackendDomainError> {
        Ok(Self::Http(HttpTransportConfig::new(url)?))
    }

    /// Creates an `event_stream` transport.
    ///
    /// # Errors
    ///
    /// Returns validation errors from [`EventStreamTransportConfig::new`].
    pub fn event_stream(url: impl Into<String>) -> Result<Self, BackendDomainError> {
        Ok(Self::EventStream(EventStreamTransportConfig::new(url)?))
    }

    /// Returns the transport kind.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::LocalProcess(_) => TransportKind::LocalProcess,
            Self::RemoteShell(_) => TransportKind::RemoteShell,
            Self::Http(_) => TransportKind::Http,
            Self::EventStream(_) => TransportKind::EventStream,
        }
    }

    /// Returns a short description of where the backend is reached.
    #[must_use]
    pub fn endpoint(&self) -> String {
        match self {
            Self::LocalProcess(config) => config.command().to_owned(),
            Self::RemoteShell(config) => format!("{}:{}", config.host(), config.command()),
            Self::Http(config) => config.url().to_owned(),
            Self::EventStream(config) => config.url().to_owned(),
        }
    }

    /// Re-checks invariants of a deserialized configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`BackendDomainError`] found.
    pub fn validate(&self) -> Result<(), BackendDomainError> {
        match self {
            Self::LocalProcess(config) => config.validate(),
            Self::RemoteShell(config) => config.validate(),
            Self::Http(config) => validate_url(config.url()),
            Self::EventStream(config) => validate_url(config.url()),
        }
    }
}
