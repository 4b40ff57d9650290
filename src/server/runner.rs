//! Execution Manager
//!
//! The receiving side of the reconnect protocol. Every accepted command runs as
//! its own task; the request that started it waits a bounded time and otherwise
//! answers `Running` with an execution id. Any later reconnect with that id
//! attaches to the same task, so the work is never started twice.

use super::registry::{CommandHandlerRegistry, CommandRequest};
use crate::background::BackgroundTask;
use crate::command::protocol::{CommandReply, ExecuteRequest};
use crate::command::types::{ExecutionId, Response};
use crate::config::ExecutionConfig;
use crate::routing::types::Server;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::AbortHandle;
use tokio::time::Instant;

type ExecutionResult = Shared<BoxFuture<'static, Result<Response, String>>>;

struct Execution {
    command: String,
    result: ExecutionResult,
    task: AbortHandle,
    started: Instant,
}

pub struct ExecutionManager {
    server: Server,
    handlers: Arc<CommandHandlerRegistry>,
    executions: DashMap<ExecutionId, Execution>,
    config: ExecutionConfig,
    evictor: Mutex<Option<BackgroundTask>>,
}

impl ExecutionManager {
    pub fn new(
        server: Server,
        handlers: Arc<CommandHandlerRegistry>,
        config: ExecutionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            server,
            handlers,
            executions: DashMap::new(),
            config,
            evictor: Mutex::new(None),
        })
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn handlers(&self) -> &Arc<CommandHandlerRegistry> {
        &self.handlers
    }

    /// Executions started and not yet claimed or evicted.
    pub fn in_flight(&self) -> usize {
        self.executions.len()
    }

    /// Starts the eviction of results nobody came back for.
    pub fn start(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let task = BackgroundTask::spawn_periodic(
            "execution-eviction",
            self.config.retention(),
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(manager) = weak.upgrade() {
                        manager.evict_stale();
                    }
                }
            },
        );
        *self.evictor.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// Stops eviction and aborts executions still running.
    pub async fn shutdown(&self) {
        for execution in self.executions.iter() {
            execution.task.abort();
        }
        let task = self
            .evictor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.shutdown().await;
        }
    }

    pub async fn execute(&self, request: ExecuteRequest) -> CommandReply {
        if !self.handlers.has_handler(&request.command) {
            return CommandReply::Failed {
                message: format!("Unknown command handler: {}", request.command),
            };
        }

        let id = ExecutionId::new();
        let command = request.command.clone();
        let handlers = self.handlers.clone();
        let task = tokio::spawn(async move {
            handlers
                .execute(CommandRequest {
                    command: request.command,
                    kind: request.kind,
                    arguments: request.arguments,
                    shards: request.shards,
                })
                .await
                .map_err(|e| e.to_string())
        });

        let handle = task.abort_handle();
        let result = task
            .map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(e) => Err(format!("execution aborted: {}", e)),
            })
            .boxed()
            .shared();

        self.executions.insert(
            id.clone(),
            Execution {
                command,
                result: result.clone(),
                task: handle,
                started: Instant::now(),
            },
        );

        self.wait_on(id, result).await
    }

    pub async fn reconnect(&self, execution_id: ExecutionId) -> CommandReply {
        let Some(result) = self
            .executions
            .get(&execution_id)
            .map(|execution| execution.result.clone())
        else {
            return CommandReply::Failed {
                message: format!("Unknown execution: {}", execution_id),
            };
        };

        tracing::debug!("Reconnected to execution [{}]", execution_id);
        self.wait_on(execution_id, result).await
    }

    async fn wait_on(&self, id: ExecutionId, result: ExecutionResult) -> CommandReply {
        match tokio::time::timeout(self.config.wait(), result).await {
            Ok(outcome) => {
                self.executions.remove(&id);
                match outcome {
                    Ok(response) => CommandReply::Complete { response },
                    Err(message) => CommandReply::Failed { message },
                }
            }
            Err(_) => {
                tracing::debug!(
                    "Execution [{}] still running after {:?}",
                    id,
                    self.config.wait()
                );
                CommandReply::Running { execution_id: id }
            }
        }
    }

    /// Drops finished results older than the retention period.
    pub fn evict_stale(&self) -> usize {
        let retention = self.config.retention();
        let before = self.executions.len();

        self.executions.retain(|id, execution| {
            let stale = execution.task.is_finished() && execution.started.elapsed() >= retention;
            if stale {
                tracing::warn!(
                    "Evicting unclaimed result of [{}] ({})",
                    execution.command,
                    id
                );
            }
            !stale
        });

        before.saturating_sub(self.executions.len())
    }
}
