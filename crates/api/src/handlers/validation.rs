//! Handlers for starting, stopping and inspecting validation runs.

use account_hub_core::types::DbId;
use account_hub_core::validation::status::RunStatus;
use account_hub_core::validation::RECENT_RUNS_LIMIT;
use account_hub_db::models::validation_run::ValidationRun;
use account_hub_db::repositories::ValidationRunRepo;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::categories::find_category;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;
use crate::validation::ScriptTestResult;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RunStarted {
    pub category_id: DbId,
    pub started: bool,
}

#[derive(Debug, Serialize)]
pub struct StopResult {
    pub category_id: DbId,
    /// Whether a run was active and has been asked to stop.
    pub stopped: bool,
}

/// Body of `POST /categories/{id}/validation/test`.
#[derive(Debug, Deserialize)]
pub struct TestScriptRequest {
    /// Script to test; the category's saved script if omitted.
    pub script: Option<String>,
    /// Payload passed to `validate`.
    #[serde(alias = "test_account")]
    pub payload: String,
}

#[derive(Debug, Serialize)]
pub struct RunLog {
    pub run_id: DbId,
    pub status: RunStatus,
    pub log: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /categories/{id}/validation/run
///
/// Starts a run in the background. 400 if the category has no script,
/// 409 if a run is already active.
pub async fn run_validation(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<(StatusCode, Json<DataResponse<RunStarted>>)> {
    state.validation.run_now(id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: RunStarted {
                category_id: id,
                started: true,
            },
        }),
    ))
}

/// POST /categories/{id}/validation/stop
pub async fn stop_validation(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<StopResult>>> {
    let stopped = state.validation.stop(id);
    Ok(Json(DataResponse {
        data: StopResult {
            category_id: id,
            stopped,
        },
    }))
}

/// POST /categories/{id}/validation/test
///
/// Executes the script once against the payload; nothing is saved.
pub async fn test_validation_script(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<TestScriptRequest>,
) -> AppResult<Json<DataResponse<ScriptTestResult>>> {
    let category = find_category(&state.pool, id).await?;
    let script = input.script.unwrap_or(category.validation_script);

    let result = state
        .validation
        .test_script(id, &script, &input.payload)
        .await?;
    Ok(Json(DataResponse { data: result }))
}

/// GET /categories/{id}/validation/runs
///
/// The most recent runs, newest first.
pub async fn list_runs(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<ValidationRun>>>> {
    find_category(&state.pool, id).await?;
    let runs = ValidationRunRepo::list_for_category(&state.pool, id, Some(RECENT_RUNS_LIMIT)).await?;
    Ok(Json(DataResponse { data: runs }))
}

/// GET /validation-runs/{id}/log
pub async fn get_run_log(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<RunLog>>> {
    let run = ValidationRunRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("validation run", id))?;

    Ok(Json(DataResponse {
        data: RunLog {
            run_id: run.id,
            status: run.run_status(),
            log: run.log,
        },
    }))
}
