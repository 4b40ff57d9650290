//! Search Service Module
//!
//! The query-serving layer built on top of scatter-gather execution.
//!
//! ## Overview
//! A search names a table and a text. The coordinating node registers the query
//! in the status registry, sends the `search` command to every server holding a
//! shard of the table, and merges shard answers best-first until the query's
//! minimum number of results is reached or every shard answered.
//!
//! ## Submodules
//! - **`coordinator`**: `QueryCoordinator`, one search end to end.
//! - **`index`**: the per-shard inverted index and the `search` command handler.
//! - **`tokenizer`**: text normalization shared by indexing and querying.
//! - **`handlers`**: HTTP handlers for searching and feeding documents.
//! - **`types`**: hits, per-shard answers and the merged result.

pub mod coordinator;
pub mod handlers;
pub mod index;
pub mod tokenizer;
pub mod types;
