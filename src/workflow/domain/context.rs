//! Identity and deadline carried by every routed tool call.

use crate::catalog::domain::ProviderName;
use std::time::Duration;
use tokio::time::Instant;

const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Who is calling and when the call must be finished.
///
/// The deadline is fixed when the context is created; every hop of the call
/// (skill steps, agent task polls, transport waits) spends from the same
/// budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Caller identity used for access filtering; `None` sees everything.
    pub caller: Option<ProviderName>,
    deadline: Instant,
}

impl CallContext {
    /// Creates a context whose deadline is `timeout` from now.
    #[must_use]
    pub fn new(caller: Option<ProviderName>, timeout: Duration) -> Self {
        Self {
            caller,
            deadline: deadline_after(timeout),
        }
    }

    /// Returns the instant by which the call must finish.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns the time left before the deadline, zero once it has passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Returns whether the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Returns the same caller with the deadline pulled in to at most
    /// `limit` from now.
    #[must_use]
    pub fn capped(&self, limit: Duration) -> Self {
        Self {
            caller: self.caller.clone(),
            deadline: self.deadline.min(deadline_after(limit)),
        }
    }
}
