//! Per-shard inverted index held by the node serving the shard, and the
//! `search` command that reads it.

use super::tokenizer::{tokenize_query, tokenize_text};
use super::types::{SearchArguments, SearchHit, ShardHits, by_rank};
use crate::command::types::Response;
use crate::routing::types::Shard;
use crate::server::registry::CommandHandlerRegistry;

use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const SEARCH_COMMAND: &str = "search";

#[derive(Default)]
struct ShardDocuments {
    postings: HashMap<String, HashSet<String>>,
    documents: HashMap<String, HashSet<String>>,
}

#[derive(Default)]
pub struct ShardIndex {
    shards: DashMap<Shard, ShardDocuments>,
}

impl ShardIndex {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Indexes (or re-indexes) a document. Returns the number of distinct terms.
    pub fn index_document(&self, shard: Shard, id: &str, text: &str) -> usize {
        let terms = tokenize_text(text);
        let mut docs = self.shards.entry(shard).or_default();

        if let Some(previous) = docs.documents.remove(id) {
            for term in previous {
                if let Some(ids) = docs.postings.get_mut(&term) {
                    ids.remove(id);
                }
            }
        }

        for term in &terms {
            docs.postings
                .entry(term.clone())
                .or_default()
                .insert(id.to_string());
        }
        let count = terms.len();
        docs.documents.insert(id.to_string(), terms);
        count
    }

    pub fn document_count(&self, shard: &Shard) -> usize {
        self.shards
            .get(shard)
            .map(|docs| docs.documents.len())
            .unwrap_or(0)
    }

    /// Scores every document of the shard by how many query terms it holds.
    pub fn search(&self, shard: &Shard, text: &str, limit: usize) -> ShardHits {
        let Some(docs) = self.shards.get(shard) else {
            return ShardHits::default();
        };

        let mut scores: HashMap<&str, u64> = HashMap::new();
        for term in tokenize_query(text) {
            if let Some(ids) = docs.postings.get(&term) {
                for id in ids {
                    *scores.entry(id.as_str()).or_insert(0) += 1;
                }
            }
        }

        let mut hits: Vec<SearchHit> = scores
            .into_iter()
            .map(|(id, score)| SearchHit {
                id: id.to_string(),
                score,
                shard: shard.clone(),
            })
            .collect();
        hits.sort_by(by_rank);

        let total_results = hits.len() as u64;
        hits.truncate(limit);
        ShardHits {
            total_results,
            hits,
        }
    }
}

/// Registers the `search` index read, answering for every requested shard.
pub fn register_search_handler(registry: &CommandHandlerRegistry, index: Arc<ShardIndex>) {
    registry.register(SEARCH_COMMAND, move |request| {
        let index = index.clone();
        async move {
            let args: SearchArguments = request.arguments.decode()?;
            let mut values = Vec::with_capacity(request.shards.len());
            for shard in request.shards {
                let hits = index.search(&shard, &args.text, args.limit);
                values.push((shard, serde_json::to_value(hits)?));
            }
            Ok(Response::shard_values(values))
        }
    });
}
