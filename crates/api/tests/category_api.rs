//! HTTP-level tests for categories, accounts and validation endpoints.
//!
//! Requests go straight to the router via `tower::ServiceExt`, against an
//! in-memory database.

mod common;

use axum::body::Body;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD,
    ORIGIN,
};
use axum::http::{Method, Request, StatusCode};
use common::{
    body_json, build_test_app, delete, get, post, post_json, put_json, test_pool, test_state,
};
use serde_json::json;
use tower::ServiceExt;

async fn create_category(app: axum::Router, name: &str) -> i64 {
    let response = post_json(app, "/api/v1/categories", json!({ "name": name })).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"]
        .as_i64()
        .expect("category id")
}

// ---------------------------------------------------------------------------
// Test: GET /health reports database and run state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok() {
    let app = build_test_app(test_state(test_pool().await));
    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["active_runs"], 0);
}

// ---------------------------------------------------------------------------
// Test: CORS and request ids wrap every response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn allowed_origin_gets_cors_headers() {
    let app = build_test_app(test_state(test_pool().await));
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/categories")
        .header(ORIGIN, "http://localhost:5173")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn preflight_is_answered_by_cors_layer() {
    let app = build_test_app(test_state(test_pool().await));
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/categories")
        .header(ORIGIN, "http://localhost:5173")
        .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    assert!(response
        .headers()
        .contains_key(ACCESS_CONTROL_ALLOW_METHODS));
}

// ---------------------------------------------------------------------------
// Test: category create, get, list
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_and_fetch_category() {
    let app = build_test_app(test_state(test_pool().await));
    let id = create_category(app.clone(), "mail").await;

    let json = body_json(get(app.clone(), &format!("/api/v1/categories/{id}")).await).await;
    assert_eq!(json["data"]["name"], "mail");
    assert_eq!(json["data"]["validation_concurrency"], 1);
    assert_eq!(json["data"]["validation_cron"], "0 0 * * *");
    assert_eq!(json["data"]["history_limit"], 1000);

    let json = body_json(get(app, "/api/v1/categories").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_category_name_is_conflict() {
    let app = build_test_app(test_state(test_pool().await));
    create_category(app.clone(), "mail").await;

    let response = post_json(app, "/api/v1/categories", json!({ "name": "mail" })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

#[tokio::test]
async fn blank_category_name_is_rejected() {
    let app = build_test_app(test_state(test_pool().await));
    let response = post_json(app, "/api/v1/categories", json!({ "name": "  " })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_category_is_404() {
    let app = build_test_app(test_state(test_pool().await));
    let response = get(app, "/api/v1/categories/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Test: validation settings are normalised and the category is scheduled
// ---------------------------------------------------------------------------

#[tokio::test]
async fn settings_update_normalises_and_schedules() {
    let state = test_state(test_pool().await);
    let app = build_test_app(state.clone());
    let id = create_category(app.clone(), "mail").await;

    let response = put_json(
        app,
        &format!("/api/v1/categories/{id}/validation"),
        json!({
            "validation_script": "def validate(data):\n    return False, False\n",
            "validation_concurrency": 0,
            "validation_cron": ""
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["validation_concurrency"], 1);
    assert_eq!(json["data"]["validation_cron"], "0 0 * * *");
    assert_eq!(
        state.validation.scheduler().scheduled_categories().await,
        vec![id]
    );
    state.validation.shutdown().await;
}

#[tokio::test]
async fn concurrency_above_limit_is_clamped() {
    let state = test_state(test_pool().await);
    let app = build_test_app(state.clone());
    let id = create_category(app.clone(), "mail").await;

    let response = put_json(
        app,
        &format!("/api/v1/categories/{id}/validation"),
        json!({
            "validation_script": "def validate(data):\n    return False, False\n",
            "validation_concurrency": 1_000_000_000i64,
            "validation_cron": "*/5 * * * *"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["validation_concurrency"], 64);
    state.validation.shutdown().await;
}

#[tokio::test]
async fn malformed_cron_is_rejected() {
    let state = test_state(test_pool().await);
    let app = build_test_app(state.clone());
    let id = create_category(app.clone(), "mail").await;

    let response = put_json(
        app,
        &format!("/api/v1/categories/{id}/validation"),
        json!({
            "validation_script": "def validate(data):\n    return False, False\n",
            "validation_concurrency": 2,
            "validation_cron": "61 * * * *"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert!(state
        .validation
        .scheduler()
        .scheduled_categories()
        .await
        .is_empty());
}

#[tokio::test]
async fn clearing_script_unschedules() {
    let state = test_state(test_pool().await);
    let app = build_test_app(state.clone());
    let id = create_category(app.clone(), "mail").await;
    let uri = format!("/api/v1/categories/{id}/validation");

    put_json(
        app.clone(),
        &uri,
        json!({ "validation_script": "def validate(d): return False, False", "validation_cron": "*/5 * * * *" }),
    )
    .await;
    assert_eq!(
        state.validation.scheduler().scheduled_categories().await,
        vec![id]
    );

    let response = put_json(app, &uri, json!({ "validation_script": "" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state
        .validation
        .scheduler()
        .scheduled_categories()
        .await
        .is_empty());
}

// ---------------------------------------------------------------------------
// Test: history limit normalisation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_limit_below_one_becomes_default() {
    let app = build_test_app(test_state(test_pool().await));
    let id = create_category(app.clone(), "mail").await;
    let uri = format!("/api/v1/categories/{id}/history-limit");

    let json = body_json(put_json(app.clone(), &uri, json!({ "history_limit": 25 })).await).await;
    assert_eq!(json["data"]["history_limit"], 25);

    let json = body_json(put_json(app, &uri, json!({ "history_limit": 0 })).await).await;
    assert_eq!(json["data"]["history_limit"], 1000);
}

// ---------------------------------------------------------------------------
// Test: run and stop endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_without_script_is_bad_request() {
    let app = build_test_app(test_state(test_pool().await));
    let id = create_category(app.clone(), "mail").await;

    let response = post(app, &format!("/api/v1/categories/{id}/validation/run")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "NOT_CONFIGURED");
}

#[tokio::test]
async fn stop_without_run_reports_false() {
    let app = build_test_app(test_state(test_pool().await));
    let id = create_category(app.clone(), "mail").await;

    let response = post(app, &format!("/api/v1/categories/{id}/validation/stop")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["stopped"], false);
}

#[tokio::test]
async fn runs_and_log_lookups() {
    let app = build_test_app(test_state(test_pool().await));
    let id = create_category(app.clone(), "mail").await;

    let json = body_json(get(app.clone(), &format!("/api/v1/categories/{id}/validation/runs")).await).await;
    assert!(json["data"].as_array().unwrap().is_empty());

    let response = get(app.clone(), "/api/v1/categories/999/validation/runs").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(app, "/api/v1/validation-runs/999/log").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: accounts bulk add, dedupe and stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accounts_are_added_once() {
    let app = build_test_app(test_state(test_pool().await));
    let id = create_category(app.clone(), "mail").await;
    let uri = format!("/api/v1/categories/{id}/accounts");

    let response = post_json(
        app.clone(),
        &uri,
        json!({ "accounts": ["a@x:1", "b@x:2", " ", "a@x:1"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["submitted"], 3);
    assert_eq!(json["data"]["inserted"], 2);

    let json = body_json(get(app.clone(), &uri).await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let json = body_json(get(app, &format!("{uri}/stats")).await).await;
    assert_eq!(json["data"]["total"], 2);
    assert_eq!(json["data"]["available"], 2);
    assert_eq!(json["data"]["banned"], 0);
}

#[tokio::test]
async fn empty_account_list_is_rejected() {
    let app = build_test_app(test_state(test_pool().await));
    let id = create_category(app.clone(), "mail").await;

    let response = post_json(
        app,
        &format!("/api/v1/categories/{id}/accounts"),
        json!({ "accounts": ["", "  "] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: delete removes the category and its schedule
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_category_unschedules() {
    let state = test_state(test_pool().await);
    let app = build_test_app(state.clone());
    let id = create_category(app.clone(), "mail").await;
    put_json(
        app.clone(),
        &format!("/api/v1/categories/{id}/validation"),
        json!({ "validation_script": "def validate(d): return False, False" }),
    )
    .await;

    let response = delete(app.clone(), &format!("/api/v1/categories/{id}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(state
        .validation
        .scheduler()
        .scheduled_categories()
        .await
        .is_empty());

    let response = delete(app, &format!("/api/v1/categories/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
