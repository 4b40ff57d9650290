//! Result Merger Tests
//!
//! ## Test Scopes
//! - **Early stop**: merging stops once the minimum is reached, the rest is cancelled.
//! - **Exhaustion**: every call completes below the minimum.
//! - **Timeout / cancel / failure**: the query fails and outstanding calls are cancelled.

#[cfg(test)]
mod tests {
    use crate::config::StatusConfig;
    use crate::error::{CancelReason, ClusterError};
    use crate::executor::call::CallHandle;
    use crate::merger::merger::ResultMerger;
    use crate::merger::types::{MergeLimits, MergeState, ResultAccumulator};
    use crate::status::registry::QueryStatusRegistry;
    use crate::status::types::QueryDescriptor;

    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[derive(Default, Debug)]
    struct Counted {
        total: u64,
        parts: Vec<u64>,
    }

    impl ResultAccumulator for Counted {
        type Part = u64;

        fn accumulate(&mut self, part: u64) {
            self.total += part;
            self.parts.push(part);
        }

        fn total_results(&self) -> u64 {
            self.total
        }
    }

    /// A call producing `results` after `after` seconds, flagging completion.
    fn delayed(results: u64, after: u64, done: Arc<AtomicBool>) -> CallHandle<u64> {
        CallHandle::spawn(format!("shard-{}", results), async move {
            tokio::time::sleep(Duration::from_secs(after)).await;
            done.store(true, Ordering::SeqCst);
            Ok(results)
        })
    }

    fn limits(minimum: u64, max_secs: u64) -> MergeLimits {
        MergeLimits::new(minimum, Duration::from_secs(max_secs))
    }

    // ============================================================
    // TEST 1: Early stop
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_early_stop_cancels_remaining_calls() {
        // ARRANGE: shards report 2, 5 and 9 results, in that order
        let slow_done = Arc::new(AtomicBool::new(false));
        let mut calls = HashMap::new();
        calls.insert(0, delayed(2, 1, Arc::new(AtomicBool::new(false))));
        calls.insert(1, delayed(5, 2, Arc::new(AtomicBool::new(false))));
        calls.insert(2, delayed(9, 10, slow_done.clone()));

        // ACT
        let outcome = ResultMerger::new(limits(5, 60), "q")
            .merge::<_, Counted>(calls)
            .await
            .unwrap();

        // ASSERT: stopped at 2 + 5, the third call never finished
        assert_eq!(outcome.state, MergeState::EarlyStop);
        assert_eq!(outcome.aggregate.total, 7);
        assert_eq!(outcome.aggregate.parts, vec![2, 5]);
        assert_eq!(outcome.completed, 2);
        assert_eq!(outcome.cancelled, 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!slow_done.load(Ordering::SeqCst));
    }

    // ============================================================
    // TEST 2: Exhaustion
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_returns_everything() {
        // ARRANGE
        let mut calls = HashMap::new();
        for (key, results) in [3u64, 1, 4].into_iter().enumerate() {
            calls.insert(key, delayed(results, key as u64 + 1, Arc::new(AtomicBool::new(false))));
        }

        // ACT
        let outcome = ResultMerger::new(limits(u64::MAX, 60), "q")
            .merge::<_, Counted>(calls)
            .await
            .unwrap();

        // ASSERT: completion order is preserved in the aggregate
        assert_eq!(outcome.state, MergeState::Exhausted);
        assert_eq!(outcome.aggregate.total, 8);
        assert_eq!(outcome.aggregate.parts, vec![3, 1, 4]);
        assert_eq!(outcome.cancelled, 0);
    }

    #[tokio::test]
    async fn test_no_calls_is_exhausted_immediately() {
        // ACT
        let outcome = ResultMerger::new(limits(1, 1), "q")
            .merge::<usize, Counted>(HashMap::new())
            .await
            .unwrap();

        // ASSERT
        assert_eq!(outcome.state, MergeState::Exhausted);
        assert_eq!(outcome.completed, 0);
    }

    // ============================================================
    // TEST 3: Failure paths
    // ============================================================

    #[tokio::test(start_paused = true)]
    async fn test_timeout_between_completions() {
        // ARRANGE: second call arrives 29s after the first, budget is 5s
        let mut calls = HashMap::new();
        calls.insert(0, delayed(1, 1, Arc::new(AtomicBool::new(false))));
        calls.insert(1, delayed(1, 30, Arc::new(AtomicBool::new(false))));

        // ACT
        let result = ResultMerger::new(limits(u64::MAX, 5), "{\"term\":\"slow\"}")
            .merge::<_, Counted>(calls)
            .await;

        // ASSERT
        match result {
            Err(ClusterError::QueryTimeout {
                max_query_time_ms,
                query,
            }) => {
                assert_eq!(max_query_time_ms, 5_000);
                assert_eq!(query, "{\"term\":\"slow\"}");
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_call_fails_the_merge() {
        // ARRANGE
        let slow_done = Arc::new(AtomicBool::new(false));
        let mut calls = HashMap::new();
        calls.insert(
            0,
            CallHandle::spawn("bad", async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Err(ClusterError::remote("bad", "index corrupted"))
            }),
        );
        calls.insert(1, delayed(1, 10, slow_done.clone()));

        // ACT
        let result = ResultMerger::new(limits(u64::MAX, 60), "q")
            .merge::<_, Counted>(calls)
            .await;

        // ASSERT
        assert_eq!(result.unwrap_err(), ClusterError::remote("bad", "index corrupted"));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!slow_done.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_cancel_stops_merge() {
        // ARRANGE
        let registry = QueryStatusRegistry::new(StatusConfig::default());
        let status = registry.register(
            "docs",
            QueryDescriptor::new("q1", serde_json::Value::Null),
            Arc::new(AtomicBool::new(false)),
        );
        let mut calls = HashMap::new();
        calls.insert(0, delayed(1, 30, Arc::new(AtomicBool::new(false))));

        let canceller = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            canceller.cancel("docs", "q1");
        });

        // ACT
        let result = ResultMerger::new(limits(u64::MAX, 60), "q1")
            .with_status(status)
            .merge::<_, Counted>(calls)
            .await;

        // ASSERT
        assert_eq!(result.unwrap_err(), ClusterError::Cancelled(CancelReason::User));
    }
}
