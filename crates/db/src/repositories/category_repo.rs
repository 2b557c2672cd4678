//! Repository for the `categories` table.

use account_hub_core::types::{DbId, Timestamp};
use chrono::Utc;

use crate::models::category::{Category, CreateCategory, UpdateValidationSettings};
use crate::DbPool;

/// Column list for `categories` SELECT queries.
const COLUMNS: &str = "\
    id, name, validation_script, validation_concurrency, validation_cron, \
    history_limit, last_validated_at, created_at, updated_at";

/// Provides CRUD operations for categories.
pub struct CategoryRepo;

impl CategoryRepo {
    /// Insert a new category with default validation settings.
    pub async fn create(pool: &DbPool, input: &CreateCategory) -> Result<Category, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO categories (name, created_at, updated_at) \
             VALUES (?1, ?2, ?2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&query)
            .bind(&input.name)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    /// Find a category by ID.
    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<Option<Category>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM categories WHERE id = ?1");
        sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all categories ordered by ID.
    pub async fn list(pool: &DbPool) -> Result<Vec<Category>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM categories ORDER BY id");
        sqlx::query_as::<_, Category>(&query).fetch_all(pool).await
    }

    /// List categories with both a validation script and a cron expression.
    pub async fn list_schedulable(pool: &DbPool) -> Result<Vec<Category>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM categories \
             WHERE TRIM(validation_script) != '' AND TRIM(validation_cron) != '' \
             ORDER BY id"
        );
        sqlx::query_as::<_, Category>(&query).fetch_all(pool).await
    }

    /// Replace the validation settings. Returns `None` if the category does not exist.
    pub async fn update_validation_settings(
        pool: &DbPool,
        id: DbId,
        input: &UpdateValidationSettings,
    ) -> Result<Option<Category>, sqlx::Error> {
        let query = format!(
            "UPDATE categories SET \
                validation_script = ?2, \
                validation_concurrency = ?3, \
                validation_cron = ?4, \
                updated_at = ?5 \
             WHERE id = ?1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .bind(&input.validation_script)
            .bind(input.validation_concurrency)
            .bind(&input.validation_cron)
            .bind(Utc::now())
            .fetch_optional(pool)
            .await
    }

    /// Set the run history retention limit.
    pub async fn update_history_limit(
        pool: &DbPool,
        id: DbId,
        history_limit: i64,
    ) -> Result<Option<Category>, sqlx::Error> {
        let query = format!(
            "UPDATE categories SET history_limit = ?2, updated_at = ?3 \
             WHERE id = ?1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .bind(history_limit)
            .bind(Utc::now())
            .fetch_optional(pool)
            .await
    }

    /// Record when the category's accounts were last validated.
    pub async fn mark_validated(
        pool: &DbPool,
        id: DbId,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE categories SET last_validated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(at)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a category; accounts and runs cascade.
    pub async fn delete(pool: &DbPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
