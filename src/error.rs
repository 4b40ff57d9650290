//! Error Taxonomy
//!
//! Every failure that can surface from routing, scatter-gather execution, merging
//! or query cancellation is expressed as a [`ClusterError`].
//!
//! The type is `Clone` because a single server-level call result is shared by
//! several shard-level futures, and each of them must be able to hand the error
//! to its own caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience alias for `Result<T, ClusterError>`.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Why a query or a call stopped before producing a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    /// An explicit cancel request for this query.
    User,
    /// Mass cancellation triggered by resource pressure on the node.
    BackPressure,
    /// The call was dropped by its owner (early stop, or the caller went away).
    Abandoned,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "cancelled by user"),
            Self::BackPressure => write!(f, "cancelled due to system load"),
            Self::Abandoned => write!(f, "call abandoned"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClusterError {
    #[error("Command [{command}] rejected: {reason}")]
    Validation { command: String, reason: String },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Connection to [{server}] unavailable: {message}")]
    Connection { server: String, message: String },

    /// A single server or shard call failed. Recorded against its key.
    #[error("Remote call on [{target}] failed: {message}")]
    RemoteCall { target: String, message: String },

    /// Raised once every future of an operation has been awaited and at least
    /// one of them failed. Wraps the first failure observed.
    #[error("Command [{command}] failed on {failed} of {total} targets: {first}")]
    Aggregate {
        command: String,
        failed: usize,
        total: usize,
        first: Box<ClusterError>,
    },

    #[error("Query timeout with max query time of [{max_query_time_ms}] ms for query [{query}]")]
    QueryTimeout { max_query_time_ms: u64, query: String },

    #[error("Execution [{execution_id}] on [{target}] still running after [{budget_ms}] ms")]
    ReconnectTimeout {
        target: String,
        execution_id: String,
        budget_ms: u64,
    },

    #[error("Query {0}")]
    Cancelled(CancelReason),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClusterError {
    pub fn remote(target: impl ToString, message: impl ToString) -> Self {
        Self::RemoteCall {
            target: target.to_string(),
            message: message.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::QueryTimeout { .. } | Self::ReconnectTimeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}
