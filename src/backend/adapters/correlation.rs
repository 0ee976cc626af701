//! Request identifier allocation and response correlation.
//!
//! Every open connection owns one [`PendingRequests`] table. Callers register
//! before writing a request and wait on the returned [`PendingCall`]; the
//! connection's reader task resolves entries by identifier in whatever order
//! responses arrive. Dropping a [`PendingCall`] (for example on timeout)
//! removes its entry. A request's write and its wait share one [`Deadline`].

use crate::backend::ports::{TransportError, TransportResult};
use crate::jsonrpc::JsonRpcResponse;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

type Reply = TransportResult<Value>;

/// Point in time by which a request must be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Starts a deadline `budget` from now.
    pub(crate) fn after(budget: Duration) -> Self {
        let now = Instant::now();
        Self {
            at: now.checked_add(budget).unwrap_or(now),
            budget,
        }
    }

    /// Returns the instant the deadline falls on.
    pub(crate) const fn at(self) -> Instant {
        self.at
    }

    /// Returns the time left, zero once passed.
    pub(crate) fn remaining(self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Timeout error reporting the whole budget.
    pub(crate) fn expired(self, method: &str) -> TransportError {
        TransportError::timeout(method, self.budget)
    }
}

#[derive(Debug, Default)]
struct Waiting {
    senders: HashMap<u64, oneshot::Sender<Reply>>,
    closed: Option<String>,
}

#[derive(Debug, Default)]
struct Shared {
    next_id: AtomicU64,
    waiting: Mutex<Waiting>,
}

/// Correlation table for one connection.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingRequests {
    shared: Arc<Shared>,
}

impl PendingRequests {
    /// Allocates an identifier and registers interest in its response.
    pub(crate) fn register(&self) -> TransportResult<PendingCall> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let (sender, receiver) = oneshot::channel();
        let mut waiting = self
            .shared
            .waiting
            .lock()
            .map_err(|err| TransportError::ConnectionClosed(err.to_string()))?;
        if let Some(reason) = &waiting.closed {
            return Err(TransportError::ConnectionClosed(reason.clone()));
        }
        waiting.senders.insert(id, sender);
        Ok(PendingCall {
            id,
            receiver,
            requests: self.clone(),
        })
    }

    /// Delivers a response to its waiting caller.
    ///
    /// Returns `false` when nobody waits for the identifier, which happens
    /// after a caller timed out.
    pub(crate) fn resolve(&self, response: JsonRpcResponse) -> bool {
        let Some(id) = response.numeric_id() else {
            return false;
        };
        let sender = self
            .shared
            .waiting
            .lock()
            .ok()
            .and_then(|mut waiting| waiting.senders.remove(&id));
        let Some(sender) = sender else {
            return false;
        };
        let reply = response
            .into_result()
            .map_err(|error| TransportError::Rpc {
                code: error.code,
                message: error.message,
            });
        sender.send(reply).is_ok()
    }

    /// Fails every waiting call and rejects future registrations.
    pub(crate) fn close(&self, reason: &str) {
        let drained: Vec<_> = match self.shared.waiting.lock() {
            Ok(mut waiting) => {
                if waiting.closed.is_none() {
                    waiting.closed = Some(reason.to_owned());
                }
                waiting.senders.drain().map(|(_, sender)| sender).collect()
            }
            Err(_) => Vec::new(),
        };
        for sender in drained {
            if sender
                .send(Err(TransportError::ConnectionClosed(reason.to_owned())))
                .is_err()
            {
                debug!("caller left before connection close was reported");
            }
        }
    }

    fn forget(&self, id: u64) {
        if let Ok(mut waiting) = self.shared.waiting.lock() {
            waiting.senders.remove(&id);
        }
    }
}

/// A registered request awaiting its response.
#[derive(Debug)]
pub(crate) struct PendingCall {
    id: u64,
    receiver: oneshot::Receiver<Reply>,
    requests: PendingRequests,
}

impl PendingCall {
    /// Returns the allocated request identifier.
    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the response until `deadline` passes.
    pub(crate) async fn wait(mut self, method: &str, deadline: Deadline) -> Reply {
        match tokio::time::timeout_at(deadline.at(), &mut self.receiver).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(TransportError::ConnectionClosed(
                "connection dropped before responding".to_owned(),
            )),
            Err(_) => Err(deadline.expired(method)),
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.requests.forget(self.id);
    }
}
