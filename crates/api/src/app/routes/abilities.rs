use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};

use crate::app::services::AppServices;

/// GET /abilities: the registered ability catalog (registration order).
pub async fn list(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(services.registry.list())
}
