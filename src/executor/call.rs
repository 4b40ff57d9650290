//! Per-call plumbing: cancellable call handles, the reconnect loop and the
//! connection lease that guarantees a checked-out client goes back to its pool.

use crate::client::{CallError, ConnectionPool, RemoteClient};
use crate::command::types::{Arguments, CommandKind, ExecutionId, Response};
use crate::error::{CancelReason, ClusterError, ClusterResult};
use crate::routing::types::{Server, Shard};

use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinError};
use tokio::time::Instant;

/// A pending result of one remote call, keyed by shard or server.
///
/// Awaiting the handle yields the typed value. [`CallHandle::cancel`] aborts the
/// underlying server call; handles that share a server call are cancelled with it.
pub struct CallHandle<T> {
    target: String,
    inner: BoxFuture<'static, ClusterResult<T>>,
    abort: AbortHandle,
}

impl<T: Send + 'static> CallHandle<T> {
    pub(crate) fn new(
        target: String,
        inner: BoxFuture<'static, ClusterResult<T>>,
        abort: AbortHandle,
    ) -> Self {
        Self {
            target,
            inner,
            abort,
        }
    }

    /// Runs `fut` on the runtime and returns a handle to its result.
    pub fn spawn<F>(target: impl Into<String>, fut: F) -> Self
    where
        F: Future<Output = ClusterResult<T>> + Send + 'static,
    {
        let target = target.into();
        let task = tokio::spawn(fut);
        let abort = task.abort_handle();
        let label = target.clone();
        let inner = task.map(move |joined| flatten_join(&label, joined)).boxed();
        Self::new(target, inner, abort)
    }
}

impl<T> CallHandle<T> {
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Best-effort: a remote that already finished its work is not affected.
    ///
    /// Aborts the whole server call, not just this key. Every shard handle split
    /// from the same server call fails with `Cancelled(Abandoned)` as well, so
    /// cancel shard handles of one server together or not at all.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

impl<T> Future for CallHandle<T> {
    type Output = ClusterResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().inner.poll_unpin(cx)
    }
}

pub(crate) fn flatten_join<T>(
    target: &str,
    joined: Result<ClusterResult<T>, JoinError>,
) -> ClusterResult<T> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Err(ClusterError::Cancelled(CancelReason::Abandoned)),
        Err(e) => Err(ClusterError::remote(target, format!("call panicked: {}", e))),
    }
}

/// Issues `execute` once, then `reconnect` for as long as the remote reports the
/// same work as still running. Any real response or hard failure ends the loop.
///
/// `budget` bounds the total time spent reattaching; `None` never gives up. A
/// reconnect in flight when the budget runs out is abandoned.
pub async fn wait_for_response(
    client: &dyn RemoteClient,
    command: &str,
    kind: CommandKind,
    arguments: &Arguments,
    shards: &[Shard],
    budget: Option<Duration>,
) -> ClusterResult<Response> {
    let started = Instant::now();
    let mut execution_id: Option<ExecutionId> = None;

    loop {
        let attempt = match (&execution_id, budget) {
            (None, _) => client.execute(command, kind, arguments, shards).await,
            (Some(id), None) => client.reconnect(id).await,
            (Some(id), Some(budget)) => {
                let remaining = budget.saturating_sub(started.elapsed());
                match tokio::time::timeout(remaining, client.reconnect(id)).await {
                    Ok(attempt) => attempt,
                    Err(_) => return Err(reconnect_timeout(client, id, budget)),
                }
            }
        };

        match attempt {
            Ok(response) => return Ok(response),
            Err(CallError::StillRunning(id)) => {
                if let Some(budget) = budget
                    && started.elapsed() >= budget
                {
                    return Err(reconnect_timeout(client, &id, budget));
                }
                tracing::info!(
                    "Execution fetch timed out, reconnecting using [{}] on {}",
                    id,
                    client.server()
                );
                execution_id = Some(id);
            }
            Err(CallError::Failed(message)) => {
                return Err(ClusterError::remote(client.server(), message));
            }
        }
    }
}

fn reconnect_timeout(client: &dyn RemoteClient, id: &ExecutionId, budget: Duration) -> ClusterError {
    tracing::warn!(
        "Execution [{}] on {} exceeded reconnect budget of {:?}",
        id,
        client.server(),
        budget
    );
    ClusterError::ReconnectTimeout {
        target: client.server().to_string(),
        execution_id: id.0.clone(),
        budget_ms: budget.as_millis() as u64,
    }
}

/// A client checked out of a pool. Returned on success, discarded otherwise,
/// including when the owning task is aborted mid-call.
pub(crate) struct Lease {
    pool: Arc<dyn ConnectionPool>,
    server: Server,
    client: Option<Arc<dyn RemoteClient>>,
}

impl Lease {
    pub(crate) async fn acquire(pool: Arc<dyn ConnectionPool>, server: Server) -> ClusterResult<Self> {
        let client = pool.get_client(&server).await?;
        Ok(Self {
            pool,
            server,
            client: Some(client),
        })
    }

    pub(crate) fn client(&self) -> ClusterResult<&dyn RemoteClient> {
        self.client
            .as_deref()
            .ok_or_else(|| ClusterError::Internal("lease already released".to_string()))
    }

    pub(crate) fn release(mut self, healthy: bool) {
        if let Some(client) = self.client.take() {
            if healthy {
                self.pool.return_client(&self.server, client);
            } else {
                self.pool.discard_client(&self.server, client);
            }
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.discard_client(&self.server, client);
        }
    }
}
