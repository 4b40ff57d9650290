//! Shard-Partitioned Search Cluster Library
//!
//! This library crate defines the modules of a cluster node. It serves as the
//! foundation for the binary executable (`main.rs`) and the end-to-end tests.
//!
//! ## Architecture Modules
//!
//! - **`routing`**: shard and server identities, the `RoutingMap` seam and the
//!   per-operation routing snapshot.
//! - **`command`**: what can be executed remotely (index reads and server reads),
//!   argument validation and the wire protocol between nodes.
//! - **`client`**: outbound connections to peers, pooled per server.
//! - **`executor`**: scatter-gather execution with one call per server, per-shard
//!   results and the reconnect loop for slow executions.
//! - **`merger`**: completion-order merging with early stop and a time budget.
//! - **`status`**: the registry of running queries, cancellation and back pressure.
//! - **`server`**: the receiving side of remote commands.
//! - **`search`**: the query-serving layer tying executor, merger and registry together.
//! - **`node`**: assembly of all of the above behind one HTTP router.

pub mod background;
pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod merger;
pub mod metrics;
pub mod node;
pub mod routing;
pub mod search;
pub mod server;
pub mod status;
