//! Commands every node answers out of the box.

use super::runner::ExecutionManager;
use crate::command::types::Response;
use crate::routing::layout::RoutingMap;

use anyhow::anyhow;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Index read: each requested shard answers with the server serving it.
pub const SHARD_LAYOUT_COMMAND: &str = "shard_layout";
/// Server read: what this node serves and how busy it is.
pub const SERVER_INFO_COMMAND: &str = "server_info";

/// Registers the built-ins on the manager's handler registry.
pub fn register_builtin(manager: &Arc<ExecutionManager>, routing: Arc<dyn RoutingMap>) {
    let local = manager.server().clone();
    let started = Instant::now();

    {
        let local = local.clone();
        let routing = routing.clone();
        manager.handlers().register(SHARD_LAYOUT_COMMAND, move |request| {
            let served = routing.server_layout(&local);
            let values: Vec<_> = request
                .shards
                .into_iter()
                .filter(|shard| served.contains(shard))
                .map(|shard| (shard, json!(local.to_string())))
                .collect();
            async move { Ok(Response::shard_values(values)) }
        });
    }

    let weak = Arc::downgrade(manager);
    manager.handlers().register(SERVER_INFO_COMMAND, move |request| {
        let served = routing.server_layout(&local);
        let mut tables: Vec<String> = served.iter().map(|shard| shard.table.clone()).collect();
        tables.sort();
        tables.dedup();

        let value = weak.upgrade().map(|manager| {
            json!({
                "server": local.to_string(),
                "shards": served.len(),
                "requested_shards": request.shards.len(),
                "tables": tables,
                "executions_in_flight": manager.in_flight(),
                "uptime_ms": started.elapsed().as_millis() as u64,
            })
        });
        async move {
            let value = value.ok_or_else(|| anyhow!("execution manager shut down"))?;
            Ok(Response::server_value(value))
        }
    });
}
