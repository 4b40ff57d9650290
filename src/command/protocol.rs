//! Command Network Protocol
//!
//! Defines the HTTP endpoints and Data Transfer Objects (DTOs) exchanged between
//! the executing client and the node running a command.
//!
//! A remote execution that outlives the server-side wait window is answered with
//! `Running`, carrying an execution id the client reattaches to through the
//! reconnect endpoint.

use super::types::{Arguments, CommandKind, ExecutionId, Response};
use crate::routing::types::Shard;
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Starts a command execution on the receiving node.
pub const ENDPOINT_COMMAND_EXECUTE: &str = "/internal/command/execute";
/// Reattaches to an execution that was reported as still running.
pub const ENDPOINT_COMMAND_RECONNECT: &str = "/internal/command/reconnect";
/// Liveness check used when a connection is checked out of the pool.
pub const ENDPOINT_PING: &str = "/internal/ping";
/// Timing counters of the instrumented operations.
pub const ENDPOINT_METRICS: &str = "/internal/metrics";

// --- Data Transfer Objects ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    /// Name of the registered command handler.
    pub command: String,
    pub kind: CommandKind,
    pub arguments: Arguments,
    /// Shards the caller expects this node to answer for.
    pub shards: Vec<Shard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectRequest {
    pub execution_id: ExecutionId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandReply {
    Complete { response: Response },
    Running { execution_id: ExecutionId },
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub server: String,
    pub executions_in_flight: usize,
}
