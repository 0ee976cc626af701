//! Runtime settings for the gateway.
//!
//! All fields have defaults, so an empty JSON object is a valid
//! configuration. Durations are expressed in milliseconds on the wire.

use serde::{Deserialize, Serialize};
use std::time::Duration;

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Bounded exponential backoff for backend reconnection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    /// Delay before the first retry.
    #[serde(rename = "initial_ms", with = "millis")]
    pub initial: Duration,
    /// Upper bound for any single delay.
    #[serde(rename = "max_ms", with = "millis")]
    pub max: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: u32,
    /// Retry budget; `None` retries until torn down.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 2,
            max_attempts: None,
        }
    }
}

impl BackoffSettings {
    /// Returns the delay before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .max(1)
            .checked_pow(attempt)
            .unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }

    /// Returns whether retry number `attempt` (zero-based) is within budget.
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|limit| attempt < limit)
    }
}

/// Gateway-wide runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Name reported to clients and backends during the handshake.
    pub server_name: String,
    /// Version reported to clients and backends during the handshake.
    pub server_version: String,
    /// Default deadline for a tool invocation.
    #[serde(rename = "invocation_timeout_ms", with = "millis")]
    pub invocation_timeout: Duration,
    /// Deadline for connecting and completing the backend handshake.
    #[serde(rename = "handshake_timeout_ms", with = "millis")]
    pub handshake_timeout: Duration,
    /// Interval between backend liveness checks.
    #[serde(rename = "health_check_interval_ms", with = "millis")]
    pub health_check_interval: Duration,
    /// Grace period between SIGTERM and SIGKILL for backend processes.
    #[serde(rename = "process_kill_grace_ms", with = "millis")]
    pub process_kill_grace: Duration,
    /// Reconnection schedule for degraded backends.
    pub reconnect: BackoffSettings,
    /// Interval between agent task status polls.
    #[serde(rename = "agent_poll_interval_ms", with = "millis")]
    pub agent_poll_interval: Duration,
    /// Deadline for an agent task to reach a terminal state.
    #[serde(rename = "agent_task_deadline_ms", with = "millis")]
    pub agent_task_deadline: Duration,
    /// Deadline for each step of a skill run.
    #[serde(rename = "skill_step_timeout_ms", with = "millis")]
    pub skill_step_timeout: Duration,
    /// Base URL under which hosted agents are reachable.
    pub public_url: String,
    /// Age after which finished hosted agent tasks are purged.
    #[serde(rename = "task_retention_ms", with = "millis")]
    pub task_retention: Duration,
    /// Interval between hosted task purges.
    #[serde(rename = "task_cleanup_interval_ms", with = "millis")]
    pub task_cleanup_interval: Duration,
    /// Idle time after which a client session expires.
    #[serde(rename = "session_idle_timeout_ms", with = "millis")]
    pub session_idle_timeout: Duration,
    /// Interval between session expiry sweeps.
    #[serde(rename = "session_cleanup_interval_ms", with = "millis")]
    pub session_cleanup_interval: Duration,
    /// Open sessions kept before the least recently seen is evicted.
    pub max_sessions: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            server_name: env!("CARGO_PKG_NAME").to_owned(),
            server_version: env!("CARGO_PKG_VERSION").to_owned(),
            invocation_timeout: Duration::from_secs(60),
            handshake_timeout: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(30),
            process_kill_grace: Duration::from_secs(5),
            reconnect: BackoffSettings::default(),
            agent_poll_interval: Duration::from_millis(500),
            agent_task_deadline: Duration::from_secs(300),
            skill_step_timeout: Duration::from_secs(60),
            public_url: "http://127.0.0.1:8080".to_owned(),
            task_retention: Duration::from_secs(3600),
            task_cleanup_interval: Duration::from_secs(600),
            session_idle_timeout: Duration::from_secs(1800),
            session_cleanup_interval: Duration::from_secs(300),
            max_sessions: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(0, 500)]
    #[case(1, 1_000)]
    #[case(3, 4_000)]
    #[case(10, 30_000)]
    #[case(64, 30_000)]
    fn backoff_grows_and_saturates(#[case] attempt: u32, #[case] expected_ms: u64) {
        let backoff = BackoffSettings::default();
        assert_eq!(backoff.delay_for(attempt), Duration::from_millis(expected_ms));
    }

    #[test]
    fn attempt_budget_is_respected() {
        let backoff = BackoffSettings {
            max_attempts: Some(2),
            ..BackoffSettings::default()
        };

        assert!(backoff.allows(1));
        assert!(!backoff.allows(2));
        assert!(BackoffSettings::default().allows(u32::MAX));
    }

    #[test]
    fn partial_settings_fall_back_to_defaults() {
        let settings: GatewaySettings = serde_json::from_value(json!({
            "invocation_timeout_ms": 1500,
            "reconnect": {"max_attempts": 3}
        }))
        .expect("settings should parse");

        assert_eq!(settings.invocation_timeout, Duration::from_millis(1500));
        assert_eq!(settings.reconnect.max_attempts, Some(3));
        assert_eq!(settings.reconnect.initial, Duration::from_millis(500));
        assert_eq!(settings.server_name, "gatehouse");
    }

    #[test]
    fn hosting_and_session_limits_have_defaults() {
        let settings: GatewaySettings = serde_json::from_value(json!({
            "public_url": "https://gw.example",
            "session_idle_timeout_ms": 60000
        }))
        .expect("settings should parse");

        assert_eq!(settings.public_url, "https://gw.example");
        assert_eq!(settings.session_idle_timeout, Duration::from_secs(60));
        assert_eq!(settings.task_retention, Duration::from_secs(3600));
        assert_eq!(settings.task_cleanup_interval, Duration::from_secs(600));
        assert_eq!(settings.max_sessions, 1000);
    }
}
