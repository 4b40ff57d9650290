//! Client Module
//!
//! The outbound side of remote command execution.
//!
//! ## Responsibilities
//! - **`RemoteClient`**: one handle to one server, able to `execute` a command or
//!   `reconnect` to an execution the server reported as still running.
//! - **`ConnectionPool`**: hands out client handles per server and takes them back
//!   (or discards them) once a call is over.
//! - **`http`**: the JSON-over-HTTP implementation used between nodes.

pub mod http;

use crate::command::types::{Arguments, CommandKind, ExecutionId, Response};
use crate::error::ClusterResult;
use crate::routing::types::{Server, Shard};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Outcome of a single request that did not produce a [`Response`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    /// The remote execution is slow, not failed. Reattach with the id.
    #[error("Execution still running as [{0}]")]
    StillRunning(ExecutionId),
    /// The remote execution or the transport failed.
    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait RemoteClient: Send + Sync {
    fn server(&self) -> &Server;

    async fn execute(
        &self,
        command: &str,
        kind: CommandKind,
        arguments: &Arguments,
        shards: &[Shard],
    ) -> Result<Response, CallError>;

    async fn reconnect(&self, execution_id: &ExecutionId) -> Result<Response, CallError>;
}

#[async_trait]
pub trait ConnectionPool: Send + Sync {
    async fn get_client(&self, server: &Server) -> ClusterResult<Arc<dyn RemoteClient>>;

    fn return_client(&self, server: &Server, client: Arc<dyn RemoteClient>);

    /// Drops a handle that saw a failure instead of returning it for reuse.
    fn discard_client(&self, server: &Server, client: Arc<dyn RemoteClient>) {
        tracing::debug!("Discarding client for {}", server);
        drop(client);
    }
}
