use axum::routing::get;
use axum::Router;

use crate::handlers::accounts;
use crate::state::AppState;

/// Merged into `/categories`.
///
/// ```text
/// GET  /{id}/accounts           -> list_accounts
/// POST /{id}/accounts           -> add_accounts
/// GET  /{id}/accounts/stats     -> account_stats
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}/accounts",
            get(accounts::list_accounts).post(accounts::add_accounts),
        )
        .route("/{id}/accounts/stats", get(accounts::account_stats))
}
