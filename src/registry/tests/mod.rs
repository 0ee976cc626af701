//! Unit tests for registry lifecycle orchestration.

mod store_tests;
