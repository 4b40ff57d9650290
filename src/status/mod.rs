//! Query Status Module
//!
//! Tracks the queries a node is coordinating so they can be listed, inspected
//! and cancelled while they run.
//!
//! ## Lifecycle
//! `Running -> Complete | Interrupted | BackPressureInterrupted`
//!
//! A status leaves `Running` exactly once. Terminal statuses stay visible for a
//! grace period (`status.cleanup_delay_ms`) and are then removed by a periodic
//! sweep (`status.cleanup_interval_ms`).
//!
//! ## Components
//! - **`registry`**: the node-wide status table and its cleanup sweep.
//! - **`backpressure`**: interrupts every running query when memory runs short.
//! - **`handlers`**: the admin HTTP surface (`/queries/...`).

pub mod backpressure;
pub mod handlers;
pub mod protocol;
pub mod registry;
pub mod types;
