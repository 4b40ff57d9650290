use super::executor::{Gathered, ScatterGatherExecutor};
use super::protocol::ClusterReadResponse;
use crate::command::types::{ServerCommand, ShardCommand};
use crate::error::ClusterError;
use crate::server::builtin::{SERVER_INFO_COMMAND, SHARD_LAYOUT_COMMAND};

use axum::{Extension, Json, extract::Path, http::StatusCode};
use std::fmt::Display;
use std::sync::Arc;

fn into_response<K: Display>(command: &str, gathered: Gathered<K, serde_json::Value>) -> ClusterReadResponse {
    ClusterReadResponse {
        command: command.to_string(),
        values: gathered
            .values
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
        failures: gathered
            .failures
            .into_iter()
            .map(|(key, e)| (key.to_string(), e.to_string()))
            .collect(),
    }
}

fn error_status(error: &ClusterError) -> StatusCode {
    match error {
        ClusterError::TableNotFound(_) => StatusCode::NOT_FOUND,
        ClusterError::Validation { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn handle_cluster_shards(
    Extension(executor): Extension<Arc<ScatterGatherExecutor>>,
    Path(table): Path<String>,
) -> (StatusCode, Json<ClusterReadResponse>) {
    let cmd = ShardCommand::<serde_json::Value>::new(SHARD_LAYOUT_COMMAND).table(&table);

    match executor.read_indexes_partial(&cmd).await {
        Ok(gathered) => (StatusCode::OK, Json(into_response(SHARD_LAYOUT_COMMAND, gathered))),
        Err(e) => {
            tracing::error!("Failed to read shard layout of [{}]: {}", table, e);
            (error_status(&e), Json(ClusterReadResponse::default()))
        }
    }
}

pub async fn handle_cluster_servers(
    Extension(executor): Extension<Arc<ScatterGatherExecutor>>,
    Path(table): Path<String>,
) -> (StatusCode, Json<ClusterReadResponse>) {
    let cmd = ServerCommand::<serde_json::Value>::new(SERVER_INFO_COMMAND).table(&table);

    match executor.read_servers_partial(&cmd).await {
        Ok(gathered) => (StatusCode::OK, Json(into_response(SERVER_INFO_COMMAND, gathered))),
        Err(e) => {
            tracing::error!("Failed to read server info for [{}]: {}", table, e);
            (error_status(&e), Json(ClusterReadResponse::default()))
        }
    }
}
