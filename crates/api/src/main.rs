use opsgate_api::app::{AppConfig, build_app};
use opsgate_core::UserId;
use opsgate_infra::PassportConfig;

#[tokio::main]
async fn main() {
    opsgate_observability::init();

    let passport = PassportConfig {
        session_ttl_secs: env_u64("SESSION_TTL_SECS", 30 * 60),
        grace_secs: env_u64("SESSION_TTL_GRACE_SECS", 5 * 60),
    };

    let bootstrap_admin = std::env::var("OPSGATE_BOOTSTRAP_ADMIN")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .map(UserId::new);
    if bootstrap_admin.is_none() {
        tracing::warn!("OPSGATE_BOOTSTRAP_ADMIN not set; no operator is seeded");
    }

    let app = build_app(AppConfig {
        passport,
        bootstrap_admin,
    })
    .await;

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind}: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
