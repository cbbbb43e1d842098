//! Route guard: the per-request authorization decision procedure.
//!
//! Terminal states are ALLOW, DENY(401), DENY(403). 401 strictly means the
//! request never authenticated (no/unknown token); 403 strictly means the
//! session is real but the privilege is not, including users absent from
//! the projection (disabled or not yet synced), who fail closed even on
//! routes that require no abilities.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::warn;

use opsgate_auth::{Decision, DenyReason, is_satisfied};
use opsgate_core::{AbilityId, UserId};
use opsgate_infra::{AccessProjection, SessionStore};

use crate::app::errors;
use crate::context::AuthContext;

pub struct Guard {
    sessions: Arc<dyn SessionStore>,
    projection: Arc<AccessProjection>,
    /// Exact request paths that bypass the guard entirely: the endpoints
    /// that establish identity, plus liveness probes.
    allowlist: Vec<String>,
}

impl Guard {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        projection: Arc<AccessProjection>,
        allowlist: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            sessions,
            projection,
            allowlist: allowlist.into_iter().collect(),
        }
    }

    pub fn is_allowlisted(&self, path: &str) -> bool {
        self.allowlist.iter().any(|p| p == path)
    }

    /// Evaluate one request.
    ///
    /// At most one session-store read; the ability check is a pure in-memory
    /// lookup against the current projection generation.
    pub async fn authorize(
        &self,
        path: &str,
        token: Option<&str>,
        required: &[AbilityId],
    ) -> Decision {
        if self.is_allowlisted(path) {
            return Decision::allow(UserId::ZERO);
        }

        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Decision::unauthenticated();
        };

        let record = match self.sessions.get(token).await {
            Ok(Some(record)) => record,
            Ok(None) => return Decision::unauthenticated(),
            Err(err) => {
                // Store outage: fail closed as an authentication failure.
                warn!(error = %err, "session store read failed during authorization");
                return Decision::unauthenticated();
            }
        };

        // The store key outlives the logical expiry by the grace window
        // (renewal's headroom); the guard enforces the logical deadline.
        if record.expires_at <= Utc::now() {
            return Decision::unauthenticated();
        }

        let user_id = record.user_id;
        let Some(effective) = self.projection.effective_abilities(user_id) else {
            return Decision::forbidden(user_id);
        };

        if is_satisfied(&effective, required) {
            Decision::allow(user_id)
        } else {
            Decision::forbidden(user_id)
        }
    }
}

/// State carried by the per-route guard layer: the guard itself plus the
/// route's statically-declared required ability ids.
pub type GuardState = (Arc<Guard>, &'static [AbilityId]);

/// Per-route middleware: evaluates the guard and attaches [`AuthContext`]
/// on ALLOW. Wire with
/// `route_layer(middleware::from_fn_with_state((guard, REQUIRED), authorize_layer))`.
pub async fn authorize_layer(
    State((guard, required)): State<GuardState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = extract_bearer(req.headers());

    match guard.authorize(req.uri().path(), token, required).await {
        Decision::Allow { user_id } => {
            req.extensions_mut().insert(AuthContext::new(user_id));
            next.run(req).await
        }
        Decision::Deny {
            reason: DenyReason::Unauthenticated,
            ..
        } => errors::json_error(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "authentication required",
        ),
        Decision::Deny {
            reason: DenyReason::Forbidden,
            ..
        } => errors::json_error(StatusCode::FORBIDDEN, "forbidden", "insufficient abilities"),
    }
}

/// Token extraction from the designated header. Absent/malformed → `None`.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsgate_auth::RecordStatus;
    use opsgate_core::RoleId;
    use opsgate_infra::{
        AccessSource, InMemoryAccessSource, InMemorySessionStore, Passport, PassportConfig,
        SessionRecord,
    };
    use std::collections::HashSet;
    use std::time::Duration;

    fn abilities(ids: &[i64]) -> HashSet<AbilityId> {
        ids.iter().copied().map(AbilityId::new).collect()
    }

    struct Fixture {
        source: Arc<InMemoryAccessSource>,
        sessions: Arc<InMemorySessionStore>,
        projection: Arc<AccessProjection>,
        guard: Guard,
    }

    fn fixture() -> Fixture {
        let source = Arc::new(InMemoryAccessSource::new());
        let sessions = Arc::new(InMemorySessionStore::new());
        let projection = Arc::new(AccessProjection::new(
            Arc::clone(&source) as Arc<dyn AccessSource>
        ));
        let guard = Guard::new(
            Arc::clone(&sessions) as Arc<dyn SessionStore>,
            Arc::clone(&projection),
            ["/health".to_string(), "/passport/login".to_string()],
        );
        Fixture {
            source,
            sessions,
            projection,
            guard,
        }
    }

    async fn login(fixture: &Fixture, user_id: i64) -> String {
        let passport = Passport::new(
            Arc::clone(&fixture.sessions) as Arc<dyn SessionStore>,
            PassportConfig::default(),
        );
        passport
            .issue(UserId::new(user_id))
            .await
            .unwrap()
            .token
    }

    #[tokio::test]
    async fn allowlisted_paths_skip_token_inspection() {
        let fixture = fixture();
        let decision = fixture
            .guard
            .authorize("/health", None, &[AbilityId::new(1)])
            .await;
        assert_eq!(decision, Decision::allow(UserId::ZERO));
    }

    #[tokio::test]
    async fn unknown_token_denies_401_with_user_zero() {
        let fixture = fixture();
        let decision = fixture.guard.authorize("/whoami", Some("abc"), &[]).await;
        assert_eq!(decision, Decision::unauthenticated());
        assert_eq!(decision.user_id(), UserId::ZERO);
    }

    #[tokio::test]
    async fn missing_token_denies_401() {
        let fixture = fixture();
        assert_eq!(
            fixture.guard.authorize("/whoami", None, &[]).await,
            Decision::unauthenticated()
        );
        assert_eq!(
            fixture.guard.authorize("/whoami", Some(""), &[]).await,
            Decision::unauthenticated()
        );
    }

    #[tokio::test]
    async fn intersection_with_required_set_allows() {
        let fixture = fixture();
        fixture
            .source
            .put_role(RoleId::new(1), abilities(&[42]), RecordStatus::Enabled);
        fixture.source.put_user(
            UserId::new(10),
            [RoleId::new(1)].into_iter().collect(),
            RecordStatus::Enabled,
        );
        fixture.projection.refresh().await.unwrap();

        let token = login(&fixture, 10).await;
        let required = &[AbilityId::new(7), AbilityId::new(42)];

        let decision = fixture
            .guard
            .authorize("/protected", Some(&token), required)
            .await;
        assert_eq!(decision, Decision::allow(UserId::new(10)));

        let denied = fixture
            .guard
            .authorize("/protected", Some(&token), &[AbilityId::new(99)])
            .await;
        assert_eq!(denied, Decision::forbidden(UserId::new(10)));
    }

    #[tokio::test]
    async fn user_absent_from_projection_denies_403_even_without_requirements() {
        let fixture = fixture();
        // Session exists, but the user was never synced (or is disabled):
        // the session is real, the privilege is not.
        let token = login(&fixture, 10).await;

        let decision = fixture.guard.authorize("/whoami", Some(&token), &[]).await;
        assert_eq!(decision, Decision::forbidden(UserId::new(10)));
    }

    #[tokio::test]
    async fn logically_expired_sessions_deny_401_within_grace() {
        let fixture = fixture();
        let now = Utc::now();
        let record = SessionRecord {
            token: "stale".to_string(),
            user_id: UserId::new(10),
            expires_at: now - chrono::Duration::seconds(1),
            created_at: now - chrono::Duration::minutes(31),
            updated_at: now - chrono::Duration::minutes(31),
        };
        // Key still alive thanks to the grace window.
        fixture
            .sessions
            .put(&record, Duration::from_secs(300))
            .await
            .unwrap();

        let decision = fixture.guard.authorize("/whoami", Some("stale"), &[]).await;
        assert_eq!(decision, Decision::unauthenticated());
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer abc".parse().unwrap(),
        );
        assert_eq!(extract_bearer(&headers), Some("abc"));

        headers.insert(axum::http::header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(axum::http::header::AUTHORIZATION, "Bearer  ".parse().unwrap());
        assert_eq!(extract_bearer(&headers), None);
    }
}
