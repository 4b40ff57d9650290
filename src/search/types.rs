use crate::merger::types::{MergeState, ResultAccumulator};
use crate::routing::types::Shard;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Arguments of the `search` command, carried in `QueryDescriptor::query`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchArguments {
    pub text: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: String,
    /// Number of distinct query terms the document contains.
    pub score: u64,
    pub shard: Shard,
}

/// One shard's answer: its best hits and how many documents matched in total.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShardHits {
    pub total_results: u64,
    pub hits: Vec<SearchHit>,
}

/// Hits of every shard merged so far, best first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResults {
    pub total_results: u64,
    pub hits: Vec<SearchHit>,
    pub shards_answered: usize,
}

pub(crate) fn by_rank(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

impl ResultAccumulator for SearchResults {
    type Part = ShardHits;

    fn accumulate(&mut self, part: ShardHits) {
        self.total_results += part.total_results;
        self.shards_answered += 1;
        self.hits.extend(part.hits);
        self.hits.sort_by(by_rank);
    }

    fn total_results(&self) -> u64 {
        self.total_results
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub uuid: String,
    pub table: String,
    pub total_results: u64,
    pub hits: Vec<SearchHit>,
    pub shards_answered: usize,
    pub state: MergeState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocumentRequest {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocumentResponse {
    pub shard: Shard,
    pub id: String,
    pub terms: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
