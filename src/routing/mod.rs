//! Routing Module
//!
//! Read-only view of where table shards live in the cluster.
//!
//! ## Core Concepts
//! - **Shard**: one partition of one table's index, identified by `(table, shard)`.
//! - **Server**: one cluster node, identified by its `host:port` string.
//! - **RoutingMap**: the layout collaborator answering "which servers exist" and
//!   "which shards does this server serve". The executor only ever reads it.
//! - **RoutingSnapshot**: the server -> shard assignment captured once at the start
//!   of an operation. In-flight calls never see later topology changes.

pub mod layout;
pub mod types;
