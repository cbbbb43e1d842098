//! Black-box tests: spawn the real router on an ephemeral port and drive it
//! over HTTP. The engine is eventually consistent (admin write → bus →
//! projection refresh), so assertions about propagation poll briefly.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;

use opsgate_api::app::{AppConfig, build_app};
use opsgate_api::catalog;
use opsgate_core::UserId;

const ADMIN: i64 = 1;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, seeded with a bootstrap admin, ephemeral port.
        let app = build_app(AppConfig {
            bootstrap_admin: Some(UserId::new(ADMIN)),
            ..AppConfig::default()
        })
        .await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn login(client: &reqwest::Client, base_url: &str, user_id: i64) -> Option<String> {
    let res = client
        .post(format!("{}/passport/login", base_url))
        .json(&json!({ "user_id": user_id }))
        .send()
        .await
        .unwrap();

    if res.status() != StatusCode::OK {
        return None;
    }
    let body: serde_json::Value = res.json().await.unwrap();
    Some(body["token"].as_str().unwrap().to_string())
}

/// Poll login until the user has propagated into the projection.
async fn login_eventually(client: &reqwest::Client, base_url: &str, user_id: i64) -> String {
    for _ in 0..100 {
        if let Some(token) = login(client, base_url, user_id).await {
            return token;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("user {user_id} never became loginable");
}

async fn get_status(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    token: &str,
) -> StatusCode {
    client
        .get(format!("{}{}", base_url, path))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .status()
}

/// Poll a GET until it returns `expected` (eventual consistency).
async fn get_status_eventually(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    token: &str,
    expected: StatusCode,
) {
    let mut last = None;
    for _ in 0..100 {
        let status = get_status(client, base_url, path, token).await;
        if status == expected {
            return;
        }
        last = Some(status);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("GET {path} never reached {expected}; last status {last:?}");
}

async fn admin_write(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    method: reqwest::Method,
    path: &str,
    body: serde_json::Value,
) {
    let res = client
        .request(method, format!("{}{}", base_url, path))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert!(
        res.status().is_success(),
        "write {path} failed: {}",
        res.status()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // A token the session store has never seen.
    assert_eq!(
        get_status(&client, &srv.base_url, "/whoami", "abc").await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn health_needs_no_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn admin_writes_propagate_to_sessions() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = login_eventually(&client, &srv.base_url, ADMIN).await;

    admin_write(
        &client,
        &srv.base_url,
        &admin,
        reqwest::Method::POST,
        "/admin/roles",
        json!({ "role_id": 7, "abilities": [100] }),
    )
    .await;
    admin_write(
        &client,
        &srv.base_url,
        &admin,
        reqwest::Method::POST,
        "/admin/users",
        json!({ "user_id": 10, "roles": [7] }),
    )
    .await;

    let token = login_eventually(&client, &srv.base_url, 10).await;
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user_id"].as_i64().unwrap(), 10);
    let abilities: Vec<i64> = body["abilities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_i64().unwrap())
        .collect();
    assert_eq!(abilities, vec![100]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn required_abilities_match_with_or_semantics() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = login_eventually(&client, &srv.base_url, ADMIN).await;

    // User 10 holds an unrelated ability; user 11 holds exactly the catalog
    // read ability (not the blanket admin one).
    admin_write(
        &client,
        &srv.base_url,
        &admin,
        reqwest::Method::POST,
        "/admin/roles",
        json!({ "role_id": 7, "abilities": [100] }),
    )
    .await;
    admin_write(
        &client,
        &srv.base_url,
        &admin,
        reqwest::Method::POST,
        "/admin/roles",
        json!({ "role_id": 8, "abilities": [catalog::ABILITY_READ.as_i64()] }),
    )
    .await;
    admin_write(
        &client,
        &srv.base_url,
        &admin,
        reqwest::Method::POST,
        "/admin/users",
        json!({ "user_id": 10, "roles": [7] }),
    )
    .await;
    admin_write(
        &client,
        &srv.base_url,
        &admin,
        reqwest::Method::POST,
        "/admin/users",
        json!({ "user_id": 11, "roles": [8] }),
    )
    .await;

    let outsider = login_eventually(&client, &srv.base_url, 10).await;
    let reader = login_eventually(&client, &srv.base_url, 11).await;

    // /abilities requires ABILITY_READ OR CONSOLE_ADMIN.
    assert_eq!(
        get_status(&client, &srv.base_url, "/abilities", &outsider).await,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        get_status(&client, &srv.base_url, "/abilities", &reader).await,
        StatusCode::OK
    );
    assert_eq!(
        get_status(&client, &srv.base_url, "/abilities", &admin).await,
        StatusCode::OK
    );

    // Revoking the granting ability propagates to an existing session.
    admin_write(
        &client,
        &srv.base_url,
        &admin,
        reqwest::Method::POST,
        "/admin/roles/8/revoke",
        json!({ "abilities": [catalog::ABILITY_READ.as_i64()] }),
    )
    .await;
    get_status_eventually(
        &client,
        &srv.base_url,
        "/abilities",
        &reader,
        StatusCode::FORBIDDEN,
    )
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disabled_users_fail_closed_even_without_required_abilities() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = login_eventually(&client, &srv.base_url, ADMIN).await;

    admin_write(
        &client,
        &srv.base_url,
        &admin,
        reqwest::Method::POST,
        "/admin/users",
        json!({ "user_id": 12, "roles": [] }),
    )
    .await;

    let token = login_eventually(&client, &srv.base_url, 12).await;
    assert_eq!(
        get_status(&client, &srv.base_url, "/whoami", &token).await,
        StatusCode::OK
    );

    admin_write(
        &client,
        &srv.base_url,
        &admin,
        reqwest::Method::PUT,
        "/admin/users/12/status",
        json!({ "status": "disabled" }),
    )
    .await;

    // The session is real, the privilege is not: 403, never 401, even
    // though /whoami requires no abilities.
    get_status_eventually(
        &client,
        &srv.base_url,
        "/whoami",
        &token,
        StatusCode::FORBIDDEN,
    )
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn renewal_rotates_the_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let old = login_eventually(&client, &srv.base_url, ADMIN).await;

    let res = client
        .post(format!("{}/passport/renewal", srv.base_url))
        .bearer_auth(&old)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let new = body["token"].as_str().unwrap().to_string();
    assert_ne!(new, old);

    assert_eq!(
        get_status(&client, &srv.base_url, "/whoami", &old).await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        get_status(&client, &srv.base_url, "/whoami", &new).await,
        StatusCode::OK
    );

    // Renewing the dead token again is a 401, not a 500.
    let res = client
        .post(format!("{}/passport/renewal", srv.base_url))
        .bearer_auth(&old)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn logout_invalidates_the_session() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = login_eventually(&client, &srv.base_url, ADMIN).await;

    let res = client
        .post(format!("{}/passport/logout", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    assert_eq!(
        get_status(&client, &srv.base_url, "/whoami", &token).await,
        StatusCode::UNAUTHORIZED
    );

    // Logout is idempotent.
    let res = client
        .post(format!("{}/passport/logout", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn audit_trail_records_admin_writes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = login_eventually(&client, &srv.base_url, ADMIN).await;

    admin_write(
        &client,
        &srv.base_url,
        &admin,
        reqwest::Method::POST,
        "/admin/roles",
        json!({ "role_id": 7, "abilities": [100] }),
    )
    .await;

    // The audit writer consumes the same bus on its own clock.
    for _ in 0..100 {
        let res = client
            .get(format!("{}/admin/audit", srv.base_url))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = res.json().await.unwrap();
        let entries = body.as_array().unwrap();
        if entries
            .iter()
            .any(|e| e["event_type"] == "access.role.changed" && e["id"].as_i64() == Some(7))
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("role change never reached the audit log");
}
