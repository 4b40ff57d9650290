//! Completion-order merge with early stop.

use super::types::{MergeLimits, MergeOutcome, MergeState, ResultAccumulator};
use crate::error::{CancelReason, ClusterError, ClusterResult};
use crate::executor::call::CallHandle;
use crate::status::types::QueryStatus;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ResultMerger {
    limits: MergeLimits,
    /// Query description used in timeout errors and logs.
    query: String,
    status: Option<Arc<QueryStatus>>,
}

impl ResultMerger {
    pub fn new(limits: MergeLimits, query: impl Into<String>) -> Self {
        Self {
            limits,
            query: query.into(),
            status: None,
        }
    }

    /// Stops the merge as soon as the query is cancelled through its status.
    pub fn with_status(mut self, status: Arc<QueryStatus>) -> Self {
        self.status = Some(status);
        self
    }

    /// Consumes results in completion order until the minimum is reached, the
    /// calls run out, the time budget expires or the query is cancelled.
    ///
    /// Results of calls that finish after the merge stopped are dropped.
    pub async fn merge<K, A>(self, calls: HashMap<K, CallHandle<A::Part>>) -> ClusterResult<MergeOutcome<A>>
    where
        A: ResultAccumulator,
    {
        let mut pending: FuturesUnordered<CallHandle<A::Part>> = calls.into_values().collect();
        let mut aggregate = A::default();
        let mut completed = 0;

        while !pending.is_empty() {
            let polled = tokio::select! {
                biased;
                reason = wait_for_cancel(self.status.as_deref()) => {
                    let cancelled = cancel_all(&pending);
                    tracing::info!(
                        "Query [{}] {} with {} calls outstanding",
                        self.query,
                        reason,
                        cancelled
                    );
                    return Err(ClusterError::Cancelled(reason));
                }
                polled = tokio::time::timeout(self.limits.max_query_time, pending.next()) => polled,
            };

            match polled {
                Ok(Some(Ok(part))) => {
                    completed += 1;
                    aggregate.accumulate(part);
                    if aggregate.total_results() >= self.limits.minimum_number_of_results {
                        let cancelled = cancel_all(&pending);
                        tracing::debug!(
                            "Query [{}] reached {} results after {} calls, cancelling {}",
                            self.query,
                            aggregate.total_results(),
                            completed,
                            cancelled
                        );
                        return Ok(MergeOutcome {
                            aggregate,
                            state: MergeState::EarlyStop,
                            completed,
                            cancelled,
                        });
                    }
                }
                Ok(Some(Err(e))) => {
                    cancel_all(&pending);
                    return Err(e);
                }
                Ok(None) => break,
                Err(_) => {
                    cancel_all(&pending);
                    tracing::info!(
                        "Query timeout with max query time of [{:?}] for query [{}]",
                        self.limits.max_query_time,
                        self.query
                    );
                    return Err(ClusterError::QueryTimeout {
                        max_query_time_ms: self.limits.max_query_time.as_millis() as u64,
                        query: self.query,
                    });
                }
            }
        }

        Ok(MergeOutcome {
            aggregate,
            state: MergeState::Exhausted,
            completed,
            cancelled: 0,
        })
    }
}

async fn wait_for_cancel(status: Option<&QueryStatus>) -> CancelReason {
    match status {
        Some(status) => status.cancelled().await,
        None => std::future::pending().await,
    }
}

fn cancel_all<T>(pending: &FuturesUnordered<CallHandle<T>>) -> usize {
    let mut cancelled = 0;
    for call in pending.iter() {
        if !call.is_finished() {
            call.cancel();
            cancelled += 1;
        }
    }
    cancelled
}
