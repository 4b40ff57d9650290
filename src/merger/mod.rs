//! Result Merger Module
//!
//! Folds per-shard partial results into one logical result as they complete.
//!
//! ## State Machine
//! `Collecting -> EarlyStop | Exhausted | TimedOut`
//!
//! - **EarlyStop**: the aggregate reached the query's minimum number of results;
//!   every outstanding call is cancelled. Latency is bounded by the slowest shard
//!   that was needed, not the slowest shard overall.
//! - **Exhausted**: all calls completed below the minimum; the aggregate is returned.
//! - **TimedOut**: no completion arrived within the query time budget; the query
//!   fails with a timeout error rather than returning a silently partial result.

pub mod merger;
pub mod types;

#[cfg(test)]
mod tests;
