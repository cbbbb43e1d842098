use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::app::services::AppServices;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

/// GET /admin/audit: most recent access changes, newest first.
pub async fn recent(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<AuditQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50).min(500);
    Json(services.audit.recent(limit))
}
