//! Port contracts for routing skill steps.

mod invoker;

#[cfg(test)]
pub use invoker::MockToolInvoker;
pub use invoker::ToolInvoker;
