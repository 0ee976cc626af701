//! Agent client and task store implementations.

mod http;
mod memory;
mod task_store;

pub use http::{HttpAgentClient, card_url};
pub use memory::{InMemoryAgentClient, SkillHandler};
pub use task_store::InMemoryTaskStore;
