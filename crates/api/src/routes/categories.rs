//! Category CRUD and settings routes.

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::categories;
use crate::state::AppState;

/// Mounted at `/categories`.
///
/// ```text
/// GET    /                      -> list_categories
/// POST   /                      -> create_category
/// GET    /{id}                  -> get_category
/// DELETE /{id}                  -> delete_category
/// PUT    /{id}/validation       -> update_validation_settings
/// PUT    /{id}/history-limit    -> update_history_limit
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/{id}",
            get(categories::get_category).delete(categories::delete_category),
        )
        .route(
            "/{id}/validation",
            put(categories::update_validation_settings),
        )
        .route("/{id}/history-limit", put(categories::update_history_limit))
}
