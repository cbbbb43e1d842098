//! Session lifecycle endpoints.
//!
//! Credential verification belongs to the external login/passport flow;
//! these endpoints cover the store-facing half: issuing, rotating, and
//! invalidating session records. All three are allowlisted: they are
//! exactly the endpoints that establish identity and must be reachable
//! without one (a renewal token may already be logically expired).

use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::app::dto::{LoginRequest, SessionResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::guard;

/// POST /passport/login: issue a session for a known, enabled user.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<LoginRequest>,
) -> axum::response::Response {
    // Unknown or disabled users get no session: absence from the
    // projection fails closed here just as it does in the guard.
    if services.projection.effective_abilities(req.user_id).is_none() {
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "unknown_user",
            "user is not present or is disabled",
        );
    }

    match services.passport.issue(req.user_id).await {
        Ok(record) => (StatusCode::OK, Json(SessionResponse::from(record))).into_response(),
        Err(err) => errors::passport_error_to_response(err),
    }
}

/// POST /passport/renewal: exchange the presented token for a fresh one.
pub async fn renewal(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let Some(token) = guard::extract_bearer(&headers) else {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "missing token",
        );
    };

    match services.passport.renew(token).await {
        Ok(record) => (StatusCode::OK, Json(SessionResponse::from(record))).into_response(),
        Err(err) => errors::passport_error_to_response(err),
    }
}

/// POST /passport/logout: invalidate the presented token (idempotent).
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let Some(token) = guard::extract_bearer(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };

    match services.passport.invalidate(token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => errors::passport_error_to_response(err),
    }
}
