use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Categories with a run in progress.
    pub active_runs: usize,
}

/// GET /health. Reports `degraded` when the database does not answer.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = account_hub_db::health_check(&state.pool).await.is_ok();
    let active_runs = state.validation.service().registry().active_categories().len();

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        active_runs,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
