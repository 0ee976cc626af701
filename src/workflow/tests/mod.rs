//! Unit tests for skill execution.
