//! Category entity model and DTOs.

use account_hub_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A named group of accounts sharing one validation script and schedule.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Category {
    pub id: DbId,
    pub name: String,
    /// Operator-supplied Python defining `validate(payload)`; empty if unset.
    pub validation_script: String,
    pub validation_concurrency: i64,
    /// Five-field cron expression; empty disables scheduling.
    pub validation_cron: String,
    pub history_limit: i64,
    pub last_validated_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Category {
    /// Whether a validation script has been configured.
    pub fn has_script(&self) -> bool {
        !self.validation_script.trim().is_empty()
    }

    /// Whether the category should have a scheduled trigger.
    pub fn is_schedulable(&self) -> bool {
        self.has_script() && !self.validation_cron.trim().is_empty()
    }
}

/// DTO for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategory {
    pub name: String,
}

/// DTO for replacing a category's validation settings.
///
/// Values are expected to be normalised by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateValidationSettings {
    pub validation_script: String,
    pub validation_concurrency: i64,
    pub validation_cron: String,
}
