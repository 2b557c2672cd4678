use account_hub_core::error::CoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error returned by handlers and by orchestrator operations.
///
/// Rendered as `{"error": ..., "code": ...}` with a status derived from the
/// variant. Internal details are logged, never sent to the client.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        AppError::Core(CoreError::NotFound { entity, id })
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Core(CoreError::NotFound { .. }) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Core(CoreError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            AppError::Core(CoreError::NotConfigured(_)) => {
                (StatusCode::BAD_REQUEST, "NOT_CONFIGURED")
            }
            AppError::Core(CoreError::Conflict(_)) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::Database(sqlx::Error::RowNotFound) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                (StatusCode::CONFLICT, "CONFLICT")
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Core(CoreError::Internal(_))
            | AppError::Database(_)
            | AppError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// The message shown to the client.
    fn public_message(&self) -> String {
        match self {
            AppError::Core(CoreError::NotFound { entity, id }) => {
                format!("{entity} with id {id} not found")
            }
            AppError::Core(
                CoreError::Validation(msg) | CoreError::NotConfigured(msg) | CoreError::Conflict(msg),
            )
            | AppError::BadRequest(msg) => msg.clone(),
            AppError::Database(sqlx::Error::RowNotFound) => "Resource not found".to_string(),
            AppError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                format!("Duplicate value: {}", db.message())
            }
            _ => "An internal error occurred".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = ErrorBody {
            error: self.public_message(),
            code,
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
