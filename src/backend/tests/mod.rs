//! Unit tests for backend registry orchestration.

mod health_tests;
