//! Unit tests for agent bridge orchestration.

mod client_failure_tests;
