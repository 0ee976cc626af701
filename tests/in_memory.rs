//! In-memory gateway integration tests.
//!
//! Tests are organized into modules by functionality:
//! - `routing_tests`: Tool calls across backends, agents and skills
//! - `catalog_change_tests`: Catalog updates as providers come and go
//! - `http_tests`: The HTTP surface served on a real listener

mod in_memory_gateway {
    pub mod helpers;

    mod catalog_change_tests;
    mod http_tests;
    mod routing_tests;
}
