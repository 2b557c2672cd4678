pub mod accounts;
pub mod categories;
pub mod health;
pub mod validation;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /categories                                 list, create
/// /categories/{id}                            get, delete
/// /categories/{id}/validation                 update settings (PUT)
/// /categories/{id}/history-limit              update retention limit (PUT)
/// /categories/{id}/validation/run             start a run (POST)
/// /categories/{id}/validation/stop            stop the active run (POST)
/// /categories/{id}/validation/test            ad-hoc script test (POST)
/// /categories/{id}/validation/runs            recent runs
/// /categories/{id}/accounts                   list, bulk add
/// /categories/{id}/accounts/stats             account counts
///
/// /validation-runs/{id}/log                   run log
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest(
            "/categories",
            categories::router()
                .merge(validation::category_router())
                .merge(accounts::router()),
        )
        .nest("/validation-runs", validation::run_router())
}
