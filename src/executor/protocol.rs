//! Cluster Read Protocol
//!
//! HTTP endpoints that run a built-in command across the cluster from any node
//! and report per-target outcomes, successes and failures side by side.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// --- API Endpoints ---

/// Which server serves each shard of a table, as answered by the servers.
pub const ENDPOINT_CLUSTER_SHARDS: &str = "/cluster/shards/:table";
/// Per-server information for every server holding a shard of a table.
pub const ENDPOINT_CLUSTER_SERVERS: &str = "/cluster/servers/:table";

// --- Data Transfer Objects ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterReadResponse {
    pub command: String,
    /// Keyed by shard (`table/shard`) or by server (`host:port`).
    pub values: BTreeMap<String, serde_json::Value>,
    pub failures: BTreeMap<String, String>,
}
