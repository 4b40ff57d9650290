use super::coordinator::QueryCoordinator;
use super::index::ShardIndex;
use super::types::{ErrorResponse, IndexDocumentRequest, IndexDocumentResponse, SearchResponse};
use crate::error::{CancelReason, ClusterError};
use crate::routing::layout::{RoutingMap, StaticLayout};
use crate::routing::types::{Server, Shard};
use crate::status::types::QueryDescriptor;

use axum::{Extension, Json, extract::Path, http::StatusCode};
use std::sync::Arc;

pub const ENDPOINT_SEARCH: &str = "/search/:table";
pub const ENDPOINT_INDEX_DOCUMENT: &str = "/shards/:table/:shard/documents";

fn status_for(error: &ClusterError) -> StatusCode {
    match error {
        ClusterError::Validation { .. } => StatusCode::BAD_REQUEST,
        ClusterError::TableNotFound(_) => StatusCode::NOT_FOUND,
        ClusterError::QueryTimeout { .. } | ClusterError::ReconnectTimeout { .. } => {
            StatusCode::GATEWAY_TIMEOUT
        }
        ClusterError::Cancelled(CancelReason::BackPressure) => StatusCode::SERVICE_UNAVAILABLE,
        ClusterError::Cancelled(_) => StatusCode::CONFLICT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

pub async fn handle_search(
    Extension(coordinator): Extension<Arc<QueryCoordinator>>,
    Path(table): Path<String>,
    Json(query): Json<QueryDescriptor>,
) -> Result<Json<SearchResponse>, (StatusCode, Json<ErrorResponse>)> {
    match coordinator.search(&table, query).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            tracing::error!("Search on [{}] failed: {}", table, e);
            Err((
                status_for(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

pub async fn handle_index_document(
    Extension(index): Extension<Arc<ShardIndex>>,
    Extension(layout): Extension<Arc<StaticLayout>>,
    Extension(local): Extension<Server>,
    Path((table, shard)): Path<(String, String)>,
    Json(req): Json<IndexDocumentRequest>,
) -> Result<(StatusCode, Json<IndexDocumentResponse>), (StatusCode, Json<ErrorResponse>)> {
    let shard = Shard::new(table, shard);
    if !layout.server_layout(&local).contains(&shard) {
        tracing::warn!("Rejected document {} for {}: not served by {}", req.id, shard, local);
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Shard {} is not served by {}", shard, local),
            }),
        ));
    }

    let terms = index.index_document(shard.clone(), &req.id, &req.text);
    tracing::debug!("Indexed document {} into {} ({} terms)", req.id, shard, terms);

    Ok((
        StatusCode::CREATED,
        Json(IndexDocumentResponse {
            shard,
            id: req.id,
            terms,
        }),
    ))
}
