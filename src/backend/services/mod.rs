//! Backend registry orchestration.

mod registry;

pub use registry::{BackendError, BackendRegistry, BackendResult, BackendStatus};
