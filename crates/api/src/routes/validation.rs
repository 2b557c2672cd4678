//! Validation run routes.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::validation;
use crate::state::AppState;

/// Merged into `/categories`.
///
/// ```text
/// POST /{id}/validation/run     -> run_validation
/// POST /{id}/validation/stop    -> stop_validation
/// POST /{id}/validation/test    -> test_validation_script
/// GET  /{id}/validation/runs    -> list_runs
/// ```
pub fn category_router() -> Router<AppState> {
    Router::new()
        .route("/{id}/validation/run", post(validation::run_validation))
        .route("/{id}/validation/stop", post(validation::stop_validation))
        .route(
            "/{id}/validation/test",
            post(validation::test_validation_script),
        )
        .route("/{id}/validation/runs", get(validation::list_runs))
}

/// Mounted at `/validation-runs`.
///
/// ```text
/// GET /{id}/log                 -> get_run_log
/// ```
pub fn run_router() -> Router<AppState> {
    Router::new().route("/{id}/log", get(validation::get_run_log))
}
