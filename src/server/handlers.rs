use super::runner::ExecutionManager;
use crate::command::protocol::{CommandReply, ExecuteRequest, PingResponse, ReconnectRequest};
use crate::metrics::{CallMetrics, MethodCallSnapshot};

use axum::{Extension, Json};
use std::sync::Arc;

pub async fn handle_execute(
    Extension(manager): Extension<Arc<ExecutionManager>>,
    Json(req): Json<ExecuteRequest>,
) -> Json<CommandReply> {
    tracing::debug!(
        "Received command '{}' for {} shards",
        req.command,
        req.shards.len()
    );
    Json(manager.execute(req).await)
}

pub async fn handle_reconnect(
    Extension(manager): Extension<Arc<ExecutionManager>>,
    Json(req): Json<ReconnectRequest>,
) -> Json<CommandReply> {
    Json(manager.reconnect(req.execution_id).await)
}

pub async fn handle_ping(Extension(manager): Extension<Arc<ExecutionManager>>) -> Json<PingResponse> {
    Json(PingResponse {
        server: manager.server().to_string(),
        executions_in_flight: manager.in_flight(),
    })
}

pub async fn handle_metrics(
    Extension(metrics): Extension<Arc<CallMetrics>>,
) -> Json<Vec<MethodCallSnapshot>> {
    Json(metrics.snapshot())
}
