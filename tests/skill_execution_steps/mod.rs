//! Step definitions for skill execution BDD scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
