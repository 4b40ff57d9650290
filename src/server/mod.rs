//! Server Module
//!
//! The executing side of remote commands: the node that owns the shards.
//!
//! ## Components
//! - **`registry`**: command name -> async handler.
//! - **`runner`**: runs each accepted command once and lets callers reattach to
//!   slow executions by id.
//! - **`builtin`**: commands every node registers at startup.
//! - **`handlers`**: the `/internal/...` HTTP endpoints peers call.

pub mod builtin;
pub mod handlers;
pub mod registry;
pub mod runner;

#[cfg(test)]
mod tests;
