//! Tool routing and the protocol method table.

mod methods;
mod router;

pub use router::Gateway;
