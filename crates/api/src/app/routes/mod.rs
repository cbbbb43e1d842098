//! HTTP routes. Each protected route group declares its required ability
//! ids as static data and wires them through a per-group guard layer.

use std::sync::Arc;

use axum::{
    Extension, Router, middleware,
    routing::{get, post, put},
};

use crate::catalog;
use crate::guard::{self, Guard};

use super::services::AppServices;

pub mod abilities;
pub mod audit;
pub mod passport;
pub mod roles;
pub mod system;
pub mod users;

pub fn router(services: Arc<AppServices>, guard: Arc<Guard>) -> Router {
    // Identity-establishing endpoints and probes: reachable without a token.
    let public = Router::new()
        .route("/health", get(system::health))
        .route("/passport/login", post(passport::login))
        .route("/passport/renewal", post(passport::renewal))
        .route("/passport/logout", post(passport::logout));

    // Any authenticated (and projection-present) user.
    let whoami = Router::new()
        .route("/whoami", get(system::whoami))
        .route_layer(middleware::from_fn_with_state(
            (Arc::clone(&guard), catalog::REQUIRE_NONE),
            guard::authorize_layer,
        ));

    let ability_routes = Router::new()
        .route("/abilities", get(abilities::list))
        .route_layer(middleware::from_fn_with_state(
            (Arc::clone(&guard), catalog::REQUIRE_ABILITY_READ),
            guard::authorize_layer,
        ));

    let role_routes = Router::new()
        .route("/admin/roles", post(roles::create))
        .route("/admin/roles/:id/grant", post(roles::grant))
        .route("/admin/roles/:id/revoke", post(roles::revoke))
        .route("/admin/roles/:id/status", put(roles::set_status))
        .route_layer(middleware::from_fn_with_state(
            (Arc::clone(&guard), catalog::REQUIRE_ROLE_WRITE),
            guard::authorize_layer,
        ));

    let user_routes = Router::new()
        .route("/admin/users", post(users::create))
        .route("/admin/users/:id/grant", post(users::grant))
        .route("/admin/users/:id/revoke", post(users::revoke))
        .route("/admin/users/:id/status", put(users::set_status))
        .route_layer(middleware::from_fn_with_state(
            (Arc::clone(&guard), catalog::REQUIRE_USER_WRITE),
            guard::authorize_layer,
        ));

    let audit_routes = Router::new()
        .route("/admin/audit", get(audit::recent))
        .route_layer(middleware::from_fn_with_state(
            (Arc::clone(&guard), catalog::REQUIRE_AUDIT_READ),
            guard::authorize_layer,
        ));

    Router::new()
        .merge(public)
        .merge(whoami)
        .merge(ability_routes)
        .merge(role_routes)
        .merge(user_routes)
        .merge(audit_routes)
        .layer(Extension(services))
}
