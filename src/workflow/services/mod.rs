//! Skill execution service.

mod executor;

pub use executor::SkillExecutor;
