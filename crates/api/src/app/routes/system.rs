use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use opsgate_core::AbilityId;

use crate::app::dto::WhoamiResponse;
use crate::app::services::AppServices;
use crate::context::AuthContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<AuthContext>,
) -> impl IntoResponse {
    let mut abilities: Vec<AbilityId> = services
        .projection
        .effective_abilities(auth.user_id())
        .unwrap_or_default()
        .into_iter()
        .collect();
    abilities.sort();

    Json(WhoamiResponse {
        user_id: auth.user_id(),
        abilities,
    })
}
