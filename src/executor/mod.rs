//! Executor Module
//!
//! Scatter-gather execution of commands across the servers that hold the
//! targeted shards.
//!
//! ## Components
//! - **`executor`**: `ScatterGatherExecutor`, routing a command to one call per
//!   server and handing back one pending result per shard or per server.
//! - **`call`**: `CallHandle`, the reconnect loop and the pooled-connection lease.
//! - **`handlers`** / **`protocol`**: cluster-wide reads of the built-in commands
//!   over HTTP (`/cluster/...`).

pub mod call;
pub mod executor;
pub mod handlers;
pub mod protocol;
