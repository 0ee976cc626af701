//! Network surfaces of the gateway.

mod http;
mod sessions;

pub use http::{AGENT_HEADER, ApiError, HttpFront, MAX_AGENT_REQUEST_BYTES, router, serve};
pub use sessions::{DEFAULT_MAX_SESSIONS, SESSION_HEADER, Session, SessionManager};
