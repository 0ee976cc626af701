//! Behaviour of agents the gateway hosts itself.

use crate::agent_bridge::domain::{Message, Task};
use async_trait::async_trait;

/// Works a task for a hosted agent.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Processes `message`, which is already the last entry of `task`'s
    /// history, and returns the updated task. An `Err` fails the task with
    /// the given reason.
    async fn handle(&self, task: Task, message: &Message) -> Result<Task, String>;
}
