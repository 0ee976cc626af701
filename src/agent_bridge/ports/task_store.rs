//! Persistence contract for tasks of agents hosted by the gateway.

use crate::agent_bridge::domain::{ListTasksParams, Task};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors returned by task stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskStoreError {
    /// The backing store failed.
    #[error("task store failure: {0}")]
    Runtime(String),
}

/// Result type for task store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Home for hosted agent tasks, keyed by agent and task identifier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Inserts or replaces `task` for `agent`, stamped as updated `at`.
    async fn save(&self, agent: &str, task: &Task, at: DateTime<Utc>) -> TaskStoreResult<()>;

    /// Returns the task `id` of `agent`.
    async fn get(&self, agent: &str, id: &str) -> TaskStoreResult<Option<Task>>;

    /// Returns `agent`'s tasks passing `filter`, oldest first.
    async fn list(&self, agent: &str, filter: &ListTasksParams) -> TaskStoreResult<Vec<Task>>;

    /// Removes terminal tasks last updated before `cutoff` and returns how
    /// many went.
    async fn purge_terminal(&self, cutoff: DateTime<Utc>) -> TaskStoreResult<usize>;

    /// Returns the number of stored tasks.
    async fn count(&self) -> TaskStoreResult<usize>;
}
