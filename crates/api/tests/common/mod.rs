#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use account_hub_api::config::ServerConfig;
use account_hub_api::router::build_app_router;
use account_hub_api::state::AppState;
use account_hub_api::validation::{SqlRecordStore, ValidationOrchestrator};
use account_hub_core::scripting::python::PythonExecutor;
use account_hub_db::DbPool;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
    }
}

/// Fresh in-memory database with migrations applied.
pub async fn test_pool() -> DbPool {
    account_hub_db::create_memory_pool()
        .await
        .expect("in-memory pool")
}

/// Application state over `pool`.
///
/// The executor points at directories that do not exist, so a run started
/// through the HTTP layer fails each check instead of launching anything.
pub fn test_state(pool: DbPool) -> AppState {
    let executor = PythonExecutor::new("/nonexistent/venvs", "/nonexistent/uv");
    let orchestrator = ValidationOrchestrator::new(
        Arc::new(SqlRecordStore::new(pool.clone())),
        Arc::new(executor),
        Duration::from_secs(5),
        Duration::from_secs(5),
    );
    AppState {
        pool,
        config: Arc::new(test_config()),
        validation: Arc::new(orchestrator),
    }
}

/// Full router with the production middleware stack.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state, &test_config())
}

pub async fn send(app: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");
    app.oneshot(request).await.expect("response")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}
