//! User admin write-path; same shape as the role routes.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use opsgate_core::{DomainResult, OperateId, UserId};
use opsgate_events::AccessChangedEvent;

use crate::app::dto::{ChangeAccepted, CreateUserRequest, StatusRequest, UserRolesRequest};
use crate::app::errors;
use crate::app::services::AppServices;

/// POST /admin/users: create (or replace) a user's access record.
pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<CreateUserRequest>,
) -> axum::response::Response {
    let operate_id =
        services
            .source
            .put_user(req.user_id, req.roles.into_iter().collect(), req.status);
    announce(&services, req.user_id, operate_id);
    (StatusCode::CREATED, Json(ChangeAccepted { operate_id })).into_response()
}

/// POST /admin/users/:id/grant
pub async fn grant(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<UserId>,
    Json(req): Json<UserRolesRequest>,
) -> axum::response::Response {
    respond(&services, id, services.source.grant_user_roles(id, req.roles))
}

/// POST /admin/users/:id/revoke
pub async fn revoke(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<UserId>,
    Json(req): Json<UserRolesRequest>,
) -> axum::response::Response {
    respond(&services, id, services.source.revoke_user_roles(id, req.roles))
}

/// PUT /admin/users/:id/status
pub async fn set_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<UserId>,
    Json(req): Json<StatusRequest>,
) -> axum::response::Response {
    respond(&services, id, services.source.set_user_status(id, req.status))
}

fn respond(
    services: &AppServices,
    user_id: UserId,
    result: DomainResult<OperateId>,
) -> axum::response::Response {
    match result {
        Ok(operate_id) => {
            announce(services, user_id, operate_id);
            (StatusCode::OK, Json(ChangeAccepted { operate_id })).into_response()
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}

fn announce(services: &AppServices, user_id: UserId, operate_id: OperateId) {
    services.publish_change(AccessChangedEvent::user(
        user_id.as_i64(),
        operate_id,
        Utc::now(),
    ));
}
