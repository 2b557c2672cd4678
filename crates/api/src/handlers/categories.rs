//! Handlers for category CRUD and validation settings.

use account_hub_core::types::DbId;
use account_hub_core::validation::{effective_concurrency, normalize_cron, DEFAULT_HISTORY_LIMIT};
use account_hub_db::models::category::{Category, CreateCategory, UpdateValidationSettings};
use account_hub_db::repositories::CategoryRepo;
use account_hub_db::DbPool;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body of `PUT /categories/{id}/validation`.
#[derive(Debug, Deserialize)]
pub struct ValidationSettingsRequest {
    #[serde(default)]
    pub validation_script: String,
    /// Values below 1 are stored as 1.
    #[serde(default)]
    pub validation_concurrency: i64,
    /// Empty means daily at midnight.
    #[serde(default)]
    pub validation_cron: String,
}

/// Body of `PUT /categories/{id}/history-limit`.
#[derive(Debug, Deserialize)]
pub struct HistoryLimitRequest {
    pub history_limit: i64,
}

/// Load a category or fail with 404.
pub(crate) async fn find_category(pool: &DbPool, id: DbId) -> AppResult<Category> {
    CategoryRepo::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("category", id))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /categories
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Category>>>> {
    let categories = CategoryRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: categories }))
}

/// POST /categories
pub async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CreateCategory>,
) -> AppResult<(StatusCode, Json<DataResponse<Category>>)> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }

    let category = CategoryRepo::create(
        &state.pool,
        &CreateCategory {
            name: name.to_string(),
        },
    )
    .await?;
    tracing::info!(category_id = category.id, name = %category.name, "Category created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: category })))
}

/// GET /categories/{id}
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Category>>> {
    let category = find_category(&state.pool, id).await?;
    Ok(Json(DataResponse { data: category }))
}

/// DELETE /categories/{id}
///
/// Removes the schedule and stops any active run before deleting the
/// category with its accounts and runs.
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    state.validation.unschedule(id).await;
    state.validation.stop(id);

    if !CategoryRepo::delete(&state.pool, id).await? {
        return Err(AppError::not_found("category", id));
    }
    tracing::info!(category_id = id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /categories/{id}/validation
///
/// Normalises and saves the settings, then reschedules the category.
pub async fn update_validation_settings(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ValidationSettingsRequest>,
) -> AppResult<Json<DataResponse<Category>>> {
    let settings = UpdateValidationSettings {
        validation_script: input.validation_script,
        validation_concurrency: effective_concurrency(input.validation_concurrency) as i64,
        validation_cron: normalize_cron(&input.validation_cron)?,
    };

    let category = CategoryRepo::update_validation_settings(&state.pool, id, &settings)
        .await?
        .ok_or_else(|| AppError::not_found("category", id))?;

    let scheduled = state.validation.schedule_one(id).await?;
    tracing::info!(
        category_id = id,
        concurrency = category.validation_concurrency,
        cron = %category.validation_cron,
        scheduled,
        "Validation settings updated"
    );

    Ok(Json(DataResponse { data: category }))
}

/// PUT /categories/{id}/history-limit
pub async fn update_history_limit(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<HistoryLimitRequest>,
) -> AppResult<Json<DataResponse<Category>>> {
    let limit = if input.history_limit < 1 {
        DEFAULT_HISTORY_LIMIT
    } else {
        input.history_limit
    };

    let category = CategoryRepo::update_history_limit(&state.pool, id, limit)
        .await?
        .ok_or_else(|| AppError::not_found("category", id))?;

    Ok(Json(DataResponse { data: category }))
}
