use account_hub_core::types::DbId;
use account_hub_db::models::account::{Account, AccountStats};
use account_hub_db::repositories::AccountRepo;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::categories::find_category;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /categories/{id}/accounts`.
#[derive(Debug, Deserialize)]
pub struct AddAccountsRequest {
    /// One payload per account; blank entries are ignored.
    pub accounts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AddAccountsResult {
    pub submitted: usize,
    /// Payloads not already present in the category.
    pub inserted: u64,
}

/// POST /categories/{id}/accounts
pub async fn add_accounts(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AddAccountsRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<AddAccountsResult>>)> {
    find_category(&state.pool, id).await?;

    let payloads: Vec<String> = input
        .accounts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if payloads.is_empty() {
        return Err(AppError::BadRequest("accounts must not be empty".to_string()));
    }

    let inserted = AccountRepo::create_bulk(&state.pool, id, &payloads).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: AddAccountsResult {
                submitted: payloads.len(),
                inserted,
            },
        }),
    ))
}

/// GET /categories/{id}/accounts
pub async fn list_accounts(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Account>>>> {
    find_category(&state.pool, id).await?;
    let accounts = AccountRepo::list_by_category(&state.pool, id).await?;
    Ok(Json(DataResponse { data: accounts }))
}

/// GET /categories/{id}/accounts/stats
pub async fn account_stats(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<AccountStats>>> {
    find_category(&state.pool, id).await?;
    let stats = AccountRepo::count_stats(&state.pool, id).await?;
    Ok(Json(DataResponse { data: stats }))
}
