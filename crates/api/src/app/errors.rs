use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use opsgate_core::DomainError;
use opsgate_infra::PassportError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

pub fn passport_error_to_response(err: PassportError) -> axum::response::Response {
    match err {
        PassportError::SessionExpired => json_error(
            StatusCode::UNAUTHORIZED,
            "session_expired",
            "session not found or expired",
        ),
        // Distinct from a generic store error: a retry collision or a
        // reused token attempt worth flagging.
        PassportError::RotationConflict => json_error(
            StatusCode::CONFLICT,
            "rotation_conflict",
            "token rotation conflict",
        ),
        PassportError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            e.to_string(),
        ),
    }
}
