//! In-memory store for hosted agent tasks.

use crate::agent_bridge::domain::{ListTasksParams, Task};
use crate::agent_bridge::ports::{TaskStore, TaskStoreError, TaskStoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct Stored {
    sequence: u64,
    task: Task,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tasks {
    entries: HashMap<(String, String), Stored>,
    next_sequence: u64,
}

/// Thread-safe task store keeping tasks in a map.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<Tasks>,
}

impl InMemoryTaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> TaskStoreResult<MutexGuard<'_, Tasks>> {
        self.tasks
            .lock()
            .map_err(|err| TaskStoreError::Runtime(err.to_string()))
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, agent: &str, task: &Task, at: DateTime<Utc>) -> TaskStoreResult<()> {
        let mut tasks = self.lock()?;
        let key = (agent.to_owned(), task.id.clone());
        let sequence = match tasks.entries.get(&key) {
            Some(existing) => existing.sequence,
            None => {
                tasks.next_sequence = tasks.next_sequence.wrapping_add(1);
                tasks.next_sequence
            }
        };
        tasks.entries.insert(
            key,
            Stored {
                sequence,
                task: task.clone(),
                updated_at: at,
            },
        );
        Ok(())
    }

    async fn get(&self, agent: &str, id: &str) -> TaskStoreResult<Option<Task>> {
        let tasks = self.lock()?;
        Ok(tasks
            .entries
            .get(&(agent.to_owned(), id.to_owned()))
            .map(|stored| stored.task.clone()))
    }

    async fn list(&self, agent: &str, filter: &ListTasksParams) -> TaskStoreResult<Vec<Task>> {
        let tasks = self.lock()?;
        let mut matching: Vec<&Stored> = tasks
            .entries
            .iter()
            .filter(|((owner, _), stored)| owner == agent && filter.matches(&stored.task))
            .map(|(_, stored)| stored)
            .collect();
        matching.sort_by_key(|stored| stored.sequence);
        let limit = filter.limit().unwrap_or(matching.len());
        Ok(matching
            .into_iter()
            .take(limit)
            .map(|stored| stored.task.clone())
            .collect())
    }

    async fn purge_terminal(&self, cutoff: DateTime<Utc>) -> TaskStoreResult<usize> {
        let mut tasks = self.lock()?;
        let before = tasks.entries.len();
        tasks.entries.retain(|_, stored| {
            !stored.task.status.state.is_terminal() || stored.updated_at >= cutoff
        });
        Ok(before.saturating_sub(tasks.entries.len()))
    }

    async fn count(&self) -> TaskStoreResult<usize> {
        Ok(self.lock()?.entries.len())
    }
}
