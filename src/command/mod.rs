//! Command Module
//!
//! A command is a named, serializable unit of work with routing logic attached.
//!
//! ## Capability Variants
//! - **`IndexRead`**: executes once per shard; the caller receives one value per shard.
//! - **`ServerRead`**: executes once per server; the server aggregates its own shards.
//!
//! The executor keeps one code path per variant, selected at compile time by
//! the trait the command implements.
//!
//! ## Submodules
//! - **`types`**: command traits, arguments, responses and generic command builders.
//! - **`validator`**: checks run before any network call.
//! - **`protocol`**: HTTP endpoints and DTOs for remote execution.

pub mod protocol;
pub mod types;
pub mod validator;
