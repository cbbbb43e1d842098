//! Role admin write-path: every write stamps a fresh operate id and
//! publishes one change event for the projection refreshers and the audit
//! writer.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use opsgate_core::{DomainResult, OperateId, RoleId};
use opsgate_events::AccessChangedEvent;

use crate::app::dto::{ChangeAccepted, CreateRoleRequest, RoleAbilitiesRequest, StatusRequest};
use crate::app::errors;
use crate::app::services::AppServices;

/// POST /admin/roles: create (or replace) a role.
pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<CreateRoleRequest>,
) -> axum::response::Response {
    let operate_id = services.source.put_role(
        req.role_id,
        req.abilities.into_iter().collect(),
        req.status,
    );
    announce(&services, req.role_id, operate_id);
    (StatusCode::CREATED, Json(ChangeAccepted { operate_id })).into_response()
}

/// POST /admin/roles/:id/grant
pub async fn grant(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
    Json(req): Json<RoleAbilitiesRequest>,
) -> axum::response::Response {
    respond(&services, id, services.source.grant_role_abilities(id, req.abilities))
}

/// POST /admin/roles/:id/revoke
pub async fn revoke(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
    Json(req): Json<RoleAbilitiesRequest>,
) -> axum::response::Response {
    respond(&services, id, services.source.revoke_role_abilities(id, req.abilities))
}

/// PUT /admin/roles/:id/status
pub async fn set_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
    Json(req): Json<StatusRequest>,
) -> axum::response::Response {
    respond(&services, id, services.source.set_role_status(id, req.status))
}

fn respond(
    services: &AppServices,
    role_id: RoleId,
    result: DomainResult<OperateId>,
) -> axum::response::Response {
    match result {
        Ok(operate_id) => {
            announce(services, role_id, operate_id);
            (StatusCode::OK, Json(ChangeAccepted { operate_id })).into_response()
        }
        Err(err) => errors::domain_error_to_response(err),
    }
}

fn announce(services: &AppServices, role_id: RoleId, operate_id: OperateId) {
    services.publish_change(AccessChangedEvent::role(
        role_id.as_i64(),
        operate_id,
        Utc::now(),
    ));
}
