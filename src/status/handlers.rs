use super::protocol::*;
use super::registry::QueryStatusRegistry;
use super::types::QueryStatusSnapshot;

use axum::{Extension, Json, extract::Path, http::StatusCode};
use std::sync::Arc;

pub async fn handle_list_queries(
    Extension(registry): Extension<Arc<QueryStatusRegistry>>,
    Path(table): Path<String>,
) -> Json<Vec<QueryStatusSnapshot>> {
    let statuses = registry
        .list(&table)
        .iter()
        .map(|status| status.snapshot())
        .collect();
    Json(statuses)
}

pub async fn handle_list_query_ids(
    Extension(registry): Extension<Arc<QueryStatusRegistry>>,
    Path(table): Path<String>,
) -> Json<Vec<String>> {
    Json(registry.list_ids(&table))
}

pub async fn handle_get_query(
    Extension(registry): Extension<Arc<QueryStatusRegistry>>,
    Path((table, uuid)): Path<(String, String)>,
) -> (StatusCode, Json<Option<QueryStatusSnapshot>>) {
    match registry.get(&table, &uuid) {
        Some(status) => (StatusCode::OK, Json(Some(status.snapshot()))),
        None => (StatusCode::NOT_FOUND, Json(None)),
    }
}

pub async fn handle_cancel_query(
    Extension(registry): Extension<Arc<QueryStatusRegistry>>,
    Path((table, uuid)): Path<(String, String)>,
) -> (StatusCode, Json<CancelResponse>) {
    let cancelled = registry.cancel(&table, &uuid);
    let code = if cancelled > 0 || registry.get(&table, &uuid).is_some() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };

    (
        code,
        Json(CancelResponse {
            table,
            uuid,
            cancelled,
        }),
    )
}
