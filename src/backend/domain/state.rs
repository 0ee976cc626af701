//! Backend connection state machine.

use super::ParseBackendStateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendState {
    /// A connection and handshake are in progress.
    Connecting,
    /// The handshake completed and tools are listed.
    Initialized,
    /// The last connection attempt or call failed; retries are scheduled.
    Degraded,
    /// The backend was disconnected and is not retried.
    Closed,
}

impl BackendState {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Initialized => "initialized",
            Self::Degraded => "degraded",
            Self::Closed => "closed",
        }
    }

    /// Returns whether tools of a backend in this state belong in the catalog.
    #[must_use]
    pub const fn is_catalog_visible(self) -> bool {
        matches!(self, Self::Initialized)
    }

    /// Returns whether transition to `target` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Connecting, Self::Initialized | Self::Degraded | Self::Closed)
                | (
                    Self::Initialized,
                    Self::Connecting | Self::Degraded | Self::Closed
                )
                | (Self::Degraded, Self::Connecting | Self::Degraded | Self::Closed)
                | (Self::Closed, Self::Connecting | Self::Closed)
        )
    }
}

impl fmt::Display for BackendState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for BackendState {
    type Error = ParseBackendStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "connecting" => Ok(Self::Connecting),
            "initialized" => Ok(Self::Initialized),
            "degraded" => Ok(Self::Degraded),
            "closed" => Ok(Self::Closed),
            _ => Err(ParseBackendStateError(value.to_owned())),
        }
    }
}
