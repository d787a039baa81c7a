// Shared fixtures for unit and router tests

use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use reqwest::Client;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::net::TcpListener;
use tower::ServiceExt;

use super::config::AppConfig;
use super::migrations::run_migrations;
use super::state::AppState;

pub const TEST_FRONTEND: &str = "http://app.test";

/// Single-connection in-memory database with the schema applied.
///
/// Every SQLite `:memory:` connection is its own database, so the pool must
/// never open a second one.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    run_migrations(&pool, false).await.expect("migrations");
    pool
}

pub fn test_config_with(extra: &[(&str, &str)]) -> AppConfig {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("BCRYPT_COST".to_string(), "4".to_string()),
        ("FRONTEND_URL".to_string(), TEST_FRONTEND.to_string()),
        ("ACCESS_TOKEN_SECRET".to_string(), "test-access".to_string()),
        ("REFRESH_TOKEN_SECRET".to_string(), "test-refresh".to_string()),
    ]);
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    AppConfig::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

pub fn test_http() -> Client {
    Client::builder().no_proxy().build().expect("http client")
}

pub async fn test_state() -> AppState {
    AppState::new(test_config_with(&[]), memory_pool().await, test_http())
}

/// Full application router over a fresh test state.
pub async fn test_router() -> (Router, AppState) {
    let state = test_state().await;
    let config = state.config.clone();
    (crate::build_app(state.clone().into_shared(), &config), state)
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible")
}

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn spawn_mock(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let addr = listener.local_addr().expect("mock addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
    format!("http://{}", addr)
}

pub fn json_request(method: &str, uri: &str, body: Value, cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// `Cookie` header value replaying every cookie the response set.
pub fn cookie_header(response: &Response) -> String {
    set_cookies(response)
        .iter()
        .filter_map(|c| c.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
