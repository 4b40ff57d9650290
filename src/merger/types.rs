use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Running aggregate of partial results from many shards.
///
/// Ordering of the merged content is the accumulator's business; the merger
/// only reads the total count to decide when to stop.
pub trait ResultAccumulator: Default + Send {
    type Part: Send + 'static;

    fn accumulate(&mut self, part: Self::Part);

    /// Total results seen so far. Never decreases.
    fn total_results(&self) -> u64;
}

/// `Collecting` until one of the terminal states is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeState {
    Collecting,
    /// The minimum number of results was reached; outstanding calls were cancelled.
    EarlyStop,
    /// Every call completed before the minimum was reached.
    Exhausted,
    /// No call completed within the time budget. Reported as an error.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeLimits {
    pub minimum_number_of_results: u64,
    /// Bound on waiting for the next completion.
    pub max_query_time: Duration,
}

impl MergeLimits {
    pub fn new(minimum_number_of_results: u64, max_query_time: Duration) -> Self {
        Self {
            minimum_number_of_results,
            max_query_time,
        }
    }
}

#[derive(Debug)]
pub struct MergeOutcome<A> {
    pub aggregate: A,
    pub state: MergeState,
    /// Calls whose partial result was merged.
    pub completed: usize,
    /// Calls still outstanding when the merge stopped.
    pub cancelled: usize,
}
