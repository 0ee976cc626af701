//! Unit tests for routing and the client-facing surfaces.

mod http_tests;
