//! Repository for the `validation_runs` table.

use account_hub_core::types::DbId;
use account_hub_core::validation::status::RunStatus;

use crate::models::validation_run::{CreateValidationRun, UpdateValidationRun, ValidationRun};
use crate::DbPool;

/// Column list for `validation_runs` SELECT queries.
const COLUMNS: &str = "\
    id, category_id, status, total_count, processed_count, banned_count, \
    error_message, log, started_at, finished_at";

/// Provides query operations for validation runs.
pub struct ValidationRunRepo;

impl ValidationRunRepo {
    /// Insert a run record.
    pub async fn create(
        pool: &DbPool,
        input: &CreateValidationRun,
    ) -> Result<ValidationRun, sqlx::Error> {
        let query = format!(
            "INSERT INTO validation_runs \
                (category_id, status, total_count, error_message, started_at, finished_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ValidationRun>(&query)
            .bind(input.category_id)
            .bind(input.status.as_str())
            .bind(input.total_count)
            .bind(input.error_message.as_deref().unwrap_or(""))
            .bind(input.started_at)
            .bind(input.finished_at)
            .fetch_one(pool)
            .await
    }

    /// Find a run by ID.
    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<Option<ValidationRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM validation_runs WHERE id = ?1");
        sqlx::query_as::<_, ValidationRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply a partial update. Returns `false` if the run does not exist.
    pub async fn update(
        pool: &DbPool,
        id: DbId,
        input: &UpdateValidationRun,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE validation_runs SET \
                status = COALESCE(?2, status), \
                processed_count = COALESCE(?3, processed_count), \
                banned_count = COALESCE(?4, banned_count), \
                error_message = COALESCE(?5, error_message), \
                log = COALESCE(?6, log), \
                finished_at = COALESCE(?7, finished_at) \
             WHERE id = ?1",
        )
        .bind(id)
        .bind(input.status.map(RunStatus::as_str))
        .bind(input.processed_count)
        .bind(input.banned_count)
        .bind(input.error_message.as_deref())
        .bind(input.log.as_deref())
        .bind(input.finished_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List a category's runs newest first (`started_at DESC, id DESC`).
    ///
    /// `limit` of `None` returns every run.
    pub async fn list_for_category(
        pool: &DbPool,
        category_id: DbId,
        limit: Option<i64>,
    ) -> Result<Vec<ValidationRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM validation_runs \
             WHERE category_id = ?1 \
             ORDER BY started_at DESC, id DESC \
             LIMIT ?2"
        );
        // SQLite treats a negative LIMIT as "no limit".
        sqlx::query_as::<_, ValidationRun>(&query)
            .bind(category_id)
            .bind(limit.unwrap_or(-1))
            .fetch_all(pool)
            .await
    }

    /// IDs of a category's finished runs past the newest `keep`, newest
    /// first. Only keys are read; the log column is never loaded.
    pub async fn list_expired_ids(
        pool: &DbPool,
        category_id: DbId,
        keep: i64,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT id FROM validation_runs \
             WHERE category_id = ?1 AND status != 'running' \
             ORDER BY started_at DESC, id DESC \
             LIMIT -1 OFFSET ?2",
        )
        .bind(category_id)
        .bind(keep)
        .fetch_all(pool)
        .await
    }

    /// Delete the given runs, never touching one that is still running.
    ///
    /// Returns the number of rows deleted.
    pub async fn delete_many(pool: &DbPool, ids: &[DbId]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut query = String::from("DELETE FROM validation_runs WHERE status != 'running' AND id IN (");
        for i in 0..ids.len() {
            if i > 0 {
                query.push_str(", ");
            }
            query.push('?');
        }
        query.push(')');

        let mut q = sqlx::query(&query);
        for id in ids {
            q = q.bind(id);
        }
        let result = q.execute(pool).await?;
        tracing::debug!(requested = ids.len(), deleted = result.rows_affected(), "Deleted validation runs");
        Ok(result.rows_affected())
    }
}
