//! Query Coordinator
//!
//! Runs one search end to end on the querying node: registers the query, scatters
//! the `search` command to every shard of the table, and merges shard answers
//! until enough results arrived.

use super::index::SEARCH_COMMAND;
use super::types::{SearchArguments, SearchResponse, SearchResults, ShardHits};
use crate::command::types::ShardCommand;
use crate::error::{ClusterError, ClusterResult};
use crate::executor::executor::ScatterGatherExecutor;
use crate::merger::merger::ResultMerger;
use crate::merger::types::MergeLimits;
use crate::status::registry::QueryStatusRegistry;
use crate::status::types::{QueryDescriptor, QueryStatus};

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub struct QueryCoordinator {
    executor: Arc<ScatterGatherExecutor>,
    statuses: Arc<QueryStatusRegistry>,
}

/// Marks the status finished however the search ends, including when the
/// caller stops awaiting it.
struct FinishOnDrop<'a> {
    statuses: &'a QueryStatusRegistry,
    status: Arc<QueryStatus>,
}

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        self.statuses.mark_finished(&self.status);
    }
}

impl QueryCoordinator {
    pub fn new(executor: Arc<ScatterGatherExecutor>, statuses: Arc<QueryStatusRegistry>) -> Self {
        Self { executor, statuses }
    }

    pub fn statuses(&self) -> &Arc<QueryStatusRegistry> {
        &self.statuses
    }

    pub async fn search(&self, table: &str, query: QueryDescriptor) -> ClusterResult<SearchResponse> {
        let args: SearchArguments = serde_json::from_value(query.query.clone())
            .map_err(|e| ClusterError::Validation {
                command: SEARCH_COMMAND.to_string(),
                reason: e.to_string(),
            })?;

        let running = Arc::new(AtomicBool::new(true));
        let status = self.statuses.register(table, query.clone(), running);
        let _finish = FinishOnDrop {
            statuses: &self.statuses,
            status: status.clone(),
        };

        let cmd = ShardCommand::<ShardHits>::new(SEARCH_COMMAND)
            .table(table)
            .args(query.query.clone());
        let calls = self
            .executor
            .read_indexes_async_within(&cmd, Some(query.max_query_time()))?;

        tracing::debug!(
            "Query [{}] on [{}] scattered to {} shards",
            query.uuid,
            table,
            calls.len()
        );

        let limits = MergeLimits::new(query.minimum_number_of_results, query.max_query_time());
        let outcome = ResultMerger::new(limits, query.query.to_string())
            .with_status(status)
            .merge::<_, SearchResults>(calls)
            .await?;

        let mut results = outcome.aggregate;
        results.hits.truncate(args.limit);

        tracing::info!(
            "Query [{}] on [{}] finished ({:?}): {} results from {} shards",
            query.uuid,
            table,
            outcome.state,
            results.total_results,
            results.shards_answered
        );

        Ok(SearchResponse {
            uuid: query.uuid,
            table: table.to_string(),
            total_results: results.total_results,
            hits: results.hits,
            shards_answered: results.shards_answered,
            state: outcome.state,
        })
    }
}
