//! Account entity model.

use account_hub_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// One opaque payload belonging to a category.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: DbId,
    pub category_id: DbId,
    pub used: bool,
    pub banned: bool,
    /// Passed verbatim to the category's check script.
    pub data: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Per-category account counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize)]
pub struct AccountStats {
    pub total: i64,
    pub used: i64,
    pub banned: i64,
    /// Neither used nor banned.
    pub available: i64,
}
