//! Scatter-Gather Executor
//!
//! Turns one command into one remote call per target server and hands back a
//! pending result per shard (index reads) or per server (server reads).
//!
//! ## Responsibilities
//! - **Routing**: tables, then shards, then a per-operation snapshot of which
//!   servers serve them. The snapshot is never consulted again once calls are out.
//! - **Submission**: exactly one call per server, bounded by the worker pool. The
//!   serialized arguments are built once and shared by all calls.
//! - **Demultiplexing**: a server's single response is fanned out to the shard
//!   handles that expect a value from it.
//! - **Gathering**: the blocking variants await every handle before reporting,
//!   so one failing peer never hides the results of the others.

use super::call::{CallHandle, Lease, flatten_join, wait_for_response};
use crate::client::ConnectionPool;
use crate::command::types::{Arguments, Command, CommandKind, IndexRead, Response, ServerRead};
use crate::command::validator::{CommandValidator, LimitsValidator};
use crate::config::ExecutorConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::metrics::CallMetrics;
use crate::routing::layout::{RoutingMap, RoutingSnapshot};
use crate::routing::types::{Server, Shard};

use futures::FutureExt;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

pub struct ScatterGatherExecutor {
    routing: Arc<dyn RoutingMap>,
    pool: Arc<dyn ConnectionPool>,
    validator: Arc<dyn CommandValidator>,
    /// Bounds the number of calls in flight across all operations.
    workers: Arc<Semaphore>,
    worker_count: usize,
    reconnect_budget: Option<Duration>,
    metrics: Arc<CallMetrics>,
}

impl ScatterGatherExecutor {
    pub fn new(
        routing: Arc<dyn RoutingMap>,
        pool: Arc<dyn ConnectionPool>,
        config: &ExecutorConfig,
    ) -> Self {
        Self {
            routing,
            pool,
            validator: Arc::new(LimitsValidator::new(config.max_argument_bytes)),
            workers: Arc::new(Semaphore::new(config.worker_count.max(1))),
            worker_count: config.worker_count.max(1),
            reconnect_budget: config.reconnect_budget(),
            metrics: CallMetrics::new(),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn CommandValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<CallMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn routing(&self) -> &Arc<dyn RoutingMap> {
        &self.routing
    }

    pub fn metrics(&self) -> &Arc<CallMetrics> {
        &self.metrics
    }

    /// Calls currently holding a worker slot.
    pub fn calls_in_flight(&self) -> usize {
        self.worker_count
            .saturating_sub(self.workers.available_permits())
    }

    // --- Async entry points ---

    pub fn read_indexes_async<C: IndexRead>(
        &self,
        cmd: &C,
    ) -> ClusterResult<HashMap<Shard, CallHandle<C::Value>>> {
        self.read_indexes_async_within(cmd, self.reconnect_budget)
    }

    /// Same as [`Self::read_indexes_async`] with an explicit reconnect budget.
    pub fn read_indexes_async_within<C: IndexRead>(
        &self,
        cmd: &C,
        budget: Option<Duration>,
    ) -> ClusterResult<HashMap<Shard, CallHandle<C::Value>>> {
        self.metrics.time_sync("read_indexes_async", || {
            let Some((arguments, snapshot)) = self.prepare(cmd)? else {
                return Ok(HashMap::new());
            };

            let mut calls = HashMap::with_capacity(snapshot.shard_count());
            for (server, shards) in snapshot.iter() {
                let expected: Vec<Shard> = shards.iter().cloned().collect();
                let task = self.submit(
                    server.clone(),
                    cmd.name(),
                    CommandKind::IndexRead,
                    arguments.clone(),
                    expected.clone(),
                    budget,
                );

                let aborts: Vec<_> = expected
                    .into_iter()
                    .map(|shard| (shard, task.abort_handle()))
                    .collect();

                let label = server.to_string();
                let server_call = task
                    .map(move |joined| {
                        flatten_join(&label, joined)
                            .and_then(|response| response.into_shard_values(&label))
                            .map(Arc::new)
                    })
                    .boxed()
                    .shared();

                for (shard, abort) in aborts {
                    let server_call = server_call.clone();
                    let key = shard.clone();
                    let target = server.to_string();
                    let inner = async move {
                        let values = server_call.await?;
                        let value = values.get(&key).cloned().ok_or_else(|| {
                            ClusterError::remote(&target, format!("no value returned for shard [{}]", key))
                        })?;
                        Ok::<_, ClusterError>(serde_json::from_value::<C::Value>(value)?)
                    }
                    .boxed();
                    calls.insert(shard.clone(), CallHandle::new(shard.to_string(), inner, abort));
                }
            }

            tracing::debug!(
                "Command [{}] submitted to {} servers for {} shards",
                cmd.name(),
                snapshot.server_count(),
                calls.len()
            );
            Ok(calls)
        })
    }

    pub fn read_servers_async<C: ServerRead>(
        &self,
        cmd: &C,
    ) -> ClusterResult<HashMap<Server, CallHandle<C::Value>>> {
        self.metrics.time_sync("read_servers_async", || {
            let Some((arguments, snapshot)) = self.prepare(cmd)? else {
                return Ok(HashMap::new());
            };

            let mut calls = HashMap::with_capacity(snapshot.server_count());
            for (server, shards) in snapshot.iter() {
                let task = self.submit(
                    server.clone(),
                    cmd.name(),
                    CommandKind::ServerRead,
                    arguments.clone(),
                    shards.iter().cloned().collect(),
                    self.reconnect_budget,
                );
                let abort = task.abort_handle();
                let label = server.to_string();
                let inner = task
                    .map(move |joined| -> ClusterResult<C::Value> {
                        let value = flatten_join(&label, joined)
                            .and_then(|response| response.into_server_value(&label))?;
                        Ok(serde_json::from_value::<C::Value>(value)?)
                    })
                    .boxed();
                calls.insert(server.clone(), CallHandle::new(server.to_string(), inner, abort));
            }

            tracing::debug!(
                "Command [{}] submitted to {} servers",
                cmd.name(),
                calls.len()
            );
            Ok(calls)
        })
    }

    // --- Blocking entry points ---

    pub async fn read_indexes<C: IndexRead>(&self, cmd: &C) -> ClusterResult<HashMap<Shard, C::Value>> {
        self.metrics
            .time("read_indexes", async {
                let calls = self.read_indexes_async(cmd)?;
                gather(cmd.name(), calls).await.into_result()
            })
            .await
    }

    pub async fn read_servers<C: ServerRead>(&self, cmd: &C) -> ClusterResult<HashMap<Server, C::Value>> {
        self.metrics
            .time("read_servers", async {
                let calls = self.read_servers_async(cmd)?;
                gather(cmd.name(), calls).await.into_result()
            })
            .await
    }

    /// Awaits every shard call and returns successes and failures side by side.
    pub async fn read_indexes_partial<C: IndexRead>(
        &self,
        cmd: &C,
    ) -> ClusterResult<Gathered<Shard, C::Value>> {
        let calls = self.read_indexes_async(cmd)?;
        Ok(gather(cmd.name(), calls).await)
    }

    pub async fn read_servers_partial<C: ServerRead>(
        &self,
        cmd: &C,
    ) -> ClusterResult<Gathered<Server, C::Value>> {
        let calls = self.read_servers_async(cmd)?;
        Ok(gather(cmd.name(), calls).await)
    }

    // --- Internals ---

    /// Validates and routes a command. `None` means nothing to call.
    fn prepare(&self, cmd: &dyn Command) -> ClusterResult<Option<(Arguments, RoutingSnapshot)>> {
        let arguments = cmd.arguments()?;
        self.validator.validate(cmd.name(), &arguments)?;

        let routing = self.routing.as_ref();
        let tables = cmd.route_tables(routing);
        if tables.is_empty() {
            tracing::debug!("Command [{}] routed to no tables", cmd.name());
            return Ok(None);
        }

        let known = routing.tables();
        if let Some(missing) = tables.iter().find(|table| !known.contains(*table)) {
            return Err(ClusterError::TableNotFound(missing.clone()));
        }

        let shards = cmd.route_shards(routing, &tables);
        let snapshot = RoutingSnapshot::capture(routing, &tables, &shards);
        if snapshot.is_empty() {
            tracing::debug!("Command [{}] resolved to no servers", cmd.name());
            return Ok(None);
        }

        Ok(Some((arguments, snapshot)))
    }

    fn submit(
        &self,
        server: Server,
        command: &str,
        kind: CommandKind,
        arguments: Arguments,
        shards: Vec<Shard>,
        budget: Option<Duration>,
    ) -> JoinHandle<ClusterResult<Response>> {
        let pool = self.pool.clone();
        let workers = self.workers.clone();
        let command = command.to_string();

        tokio::spawn(async move {
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|_| ClusterError::Internal("worker pool closed".to_string()))?;

            let lease = Lease::acquire(pool, server.clone()).await?;
            let result =
                wait_for_response(lease.client()?, &command, kind, &arguments, &shards, budget).await;
            lease.release(result.is_ok());

            if let Err(e) = &result {
                tracing::debug!("Call [{}] on {} failed: {}", command, server, e);
            }
            result
        })
    }
}

/// Successes and failures of one operation, after every call completed.
#[derive(Debug)]
pub struct Gathered<K, T> {
    command: String,
    pub values: HashMap<K, T>,
    pub failures: Vec<(K, ClusterError)>,
}

impl<K, T> Gathered<K, T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn first_failure(&self) -> Option<&ClusterError> {
        self.failures.first().map(|(_, e)| e)
    }

    /// The values, or an aggregate error wrapping the first failure.
    pub fn into_result(self) -> ClusterResult<HashMap<K, T>> {
        let failed = self.failures.len();
        match self.failures.into_iter().next() {
            None => Ok(self.values),
            Some((_, first)) => Err(ClusterError::Aggregate {
                command: self.command,
                failed,
                total: failed + self.values.len(),
                first: Box::new(first),
            }),
        }
    }
}

/// Awaits every handle. Failures are logged against their key and collected;
/// they never stop the remaining handles from being awaited.
pub async fn gather<K, T>(command: &str, calls: HashMap<K, CallHandle<T>>) -> Gathered<K, T>
where
    K: Eq + Hash + Display,
{
    let mut values = HashMap::with_capacity(calls.len());
    let mut failures = Vec::new();

    for (key, call) in calls {
        match call.await {
            Ok(value) => {
                values.insert(key, value);
            }
            Err(e) => {
                tracing::error!(
                    "Error while executing command [{}] on server or shard [{}]: {}",
                    command,
                    key,
                    e
                );
                failures.push((key, e));
            }
        }
    }

    Gathered {
        command: command.to_string(),
        values,
        failures,
    }
}
