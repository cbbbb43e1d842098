//! HTTP API application wiring (Axum router + service wiring).
//!
//! Structure:
//! - `services.rs`: infrastructure wiring (source, bus, projection, sessions,
//!   passport, workers)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;

use opsgate_core::UserId;
use opsgate_infra::PassportConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use crate::guard::Guard;

/// Composition-root configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub passport: PassportConfig,
    /// When set, seed this user with the blanket admin ability so a fresh
    /// deployment has a first operator. Dev/test convenience; production
    /// deployments point the source at the real admin tables instead.
    pub bootstrap_admin: Option<UserId>,
}

/// Request paths that establish identity or probe liveness; exactly these
/// bypass the guard.
pub fn allowlist() -> Vec<String> {
    [
        "/health",
        "/passport/login",
        "/passport/renewal",
        "/passport/logout",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: AppConfig) -> Router {
    let services = Arc::new(services::build_services(&config).await);

    let guard = Arc::new(Guard::new(
        Arc::clone(&services.sessions),
        Arc::clone(&services.projection),
        allowlist(),
    ));

    routes::router(services, guard).layer(ServiceBuilder::new())
}
