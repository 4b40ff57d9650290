//! Node Assembly
//!
//! Wires every component of a node from its configuration and exposes the HTTP
//! router serving both the peer-facing (`/internal/...`) and the client-facing
//! endpoints.

use crate::background::BackgroundTask;
use crate::client::http::HttpConnectionPool;
use crate::command::protocol::{
    ENDPOINT_COMMAND_EXECUTE, ENDPOINT_COMMAND_RECONNECT, ENDPOINT_METRICS, ENDPOINT_PING,
};
use crate::config::NodeConfig;
use crate::executor::executor::ScatterGatherExecutor;
use crate::executor::handlers::{handle_cluster_servers, handle_cluster_shards};
use crate::executor::protocol::{ENDPOINT_CLUSTER_SERVERS, ENDPOINT_CLUSTER_SHARDS};
use crate::routing::layout::StaticLayout;
use crate::routing::types::Server;
use crate::search::coordinator::QueryCoordinator;
use crate::search::handlers::{
    ENDPOINT_INDEX_DOCUMENT, ENDPOINT_SEARCH, handle_index_document, handle_search,
};
use crate::search::index::{ShardIndex, register_search_handler};
use crate::server::builtin::register_builtin;
use crate::server::handlers::{handle_execute, handle_metrics, handle_ping, handle_reconnect};
use crate::server::registry::CommandHandlerRegistry;
use crate::server::runner::ExecutionManager;
use crate::status::backpressure::{BackPressureWatcher, ProcessMemoryProbe};
use crate::status::handlers::{
    handle_cancel_query, handle_get_query, handle_list_queries, handle_list_query_ids,
};
use crate::status::protocol::{ENDPOINT_QUERIES, ENDPOINT_QUERY, ENDPOINT_QUERY_CANCEL, ENDPOINT_QUERY_IDS};
use crate::status::registry::QueryStatusRegistry;

use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;

pub struct Node {
    pub local: Server,
    pub layout: Arc<StaticLayout>,
    pub statuses: Arc<QueryStatusRegistry>,
    pub executor: Arc<ScatterGatherExecutor>,
    pub coordinator: Arc<QueryCoordinator>,
    pub manager: Arc<ExecutionManager>,
    pub index: Arc<ShardIndex>,
    tasks: Vec<BackgroundTask>,
}

impl Node {
    /// Builds the node and starts its background tasks. Must run inside a
    /// tokio runtime.
    pub fn start(config: NodeConfig) -> Self {
        let local = Server::from(config.bind);
        let mut tasks = Vec::new();

        // 1. Routing:
        let layout = Arc::new(StaticLayout::from_assignments(
            config
                .layout
                .iter()
                .map(|entry| (entry.server.clone(), entry.shards.clone())),
        ));

        // 2. Query status registry and back pressure:
        let statuses = QueryStatusRegistry::new(config.status.clone());
        statuses.start();

        if config.backpressure.enabled {
            match config.backpressure.memory_limit_bytes {
                Some(limit) => {
                    let watcher = Arc::new(BackPressureWatcher::new(
                        statuses.clone(),
                        Arc::new(ProcessMemoryProbe::default()),
                        limit,
                        config.backpressure.threshold,
                    ));
                    tasks.push(watcher.start(config.backpressure.check_interval()));
                }
                None => tracing::info!("Back pressure enabled but no memory limit set, not watching"),
            }
        }

        // 3. Outbound execution:
        let pool = Arc::new(HttpConnectionPool::new(config.client.clone()));
        let executor = Arc::new(ScatterGatherExecutor::new(layout.clone(), pool, &config.executor));
        let coordinator = Arc::new(QueryCoordinator::new(executor.clone(), statuses.clone()));

        // 4. Inbound execution:
        let handlers = CommandHandlerRegistry::new();
        let manager = ExecutionManager::new(local.clone(), handlers.clone(), config.execution.clone());
        manager.start();
        register_builtin(&manager, layout.clone());

        let index = ShardIndex::new();
        register_search_handler(&handlers, index.clone());

        // 5. Stats reporter:
        {
            let statuses = statuses.clone();
            let executor = executor.clone();
            let manager = manager.clone();
            tasks.push(BackgroundTask::spawn_periodic(
                "node-stats",
                Duration::from_secs(30),
                move || {
                    let statuses = statuses.clone();
                    let executor = executor.clone();
                    let manager = manager.clone();
                    async move {
                        tracing::info!(
                            "Node stats: {} queries tracked ({} running), {} outbound calls, {} inbound executions",
                            statuses.len(),
                            statuses.running_count(),
                            executor.calls_in_flight(),
                            manager.in_flight()
                        );
                    }
                },
            ));
        }

        tracing::info!(
            "Node {} ready: {} servers in layout, {} local shards, handlers {:?}",
            local,
            layout.server_count(),
            config
                .layout
                .iter()
                .filter(|entry| entry.server == local)
                .map(|entry| entry.shards.len())
                .sum::<usize>(),
            handlers.list_handlers()
        );

        Self {
            local,
            layout,
            statuses,
            executor,
            coordinator,
            manager,
            index,
            tasks,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(ENDPOINT_COMMAND_EXECUTE, post(handle_execute))
            .route(ENDPOINT_COMMAND_RECONNECT, post(handle_reconnect))
            .route(ENDPOINT_PING, get(handle_ping))
            .route(ENDPOINT_METRICS, get(handle_metrics))
            .route(ENDPOINT_QUERIES, get(handle_list_queries))
            .route(ENDPOINT_QUERY_IDS, get(handle_list_query_ids))
            .route(ENDPOINT_QUERY, get(handle_get_query))
            .route(ENDPOINT_QUERY_CANCEL, post(handle_cancel_query))
            .route(ENDPOINT_SEARCH, post(handle_search))
            .route(ENDPOINT_INDEX_DOCUMENT, post(handle_index_document))
            .route(ENDPOINT_CLUSTER_SHARDS, get(handle_cluster_shards))
            .route(ENDPOINT_CLUSTER_SERVERS, get(handle_cluster_servers))
            .layer(Extension(self.manager.clone()))
            .layer(Extension(self.executor.metrics().clone()))
            .layer(Extension(self.statuses.clone()))
            .layer(Extension(self.coordinator.clone()))
            .layer(Extension(self.index.clone()))
            .layer(Extension(self.executor.clone()))
            .layer(Extension(self.layout.clone()))
            .layer(Extension(self.local.clone()))
    }

    pub async fn shutdown(self) {
        tracing::info!("Shutting down node {}", self.local);
        for task in self.tasks {
            task.shutdown().await;
        }
        self.manager.shutdown().await;
        self.statuses.shutdown().await;
    }
}
