//! Repository for the `accounts` table.

use account_hub_core::types::DbId;
use chrono::Utc;

use crate::models::account::{Account, AccountStats};
use crate::DbPool;

/// Column list for `accounts` SELECT queries.
const COLUMNS: &str = "id, category_id, used, banned, data, created_at, updated_at";

/// Provides query operations for accounts.
pub struct AccountRepo;

impl AccountRepo {
    /// Insert payloads into a category, skipping ones already present.
    ///
    /// Runs in a single transaction. Returns the number of rows inserted.
    pub async fn create_bulk(
        pool: &DbPool,
        category_id: DbId,
        payloads: &[String],
    ) -> Result<u64, sqlx::Error> {
        if payloads.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut tx = pool.begin().await?;
        let mut inserted = 0;
        for data in payloads {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO accounts (category_id, data, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?3)",
            )
            .bind(category_id)
            .bind(data)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        tracing::debug!(category_id, submitted = payloads.len(), inserted, "Bulk inserted accounts");
        Ok(inserted)
    }

    /// List all accounts in a category ordered by ID.
    pub async fn list_by_category(
        pool: &DbPool,
        category_id: DbId,
    ) -> Result<Vec<Account>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM accounts WHERE category_id = ?1 ORDER BY id");
        sqlx::query_as::<_, Account>(&query)
            .bind(category_id)
            .fetch_all(pool)
            .await
    }

    /// Accounts eligible for a validation run, in ID order.
    ///
    /// Used accounts are included; banned ones are skipped when
    /// `exclude_banned` is set.
    pub async fn list_candidates(
        pool: &DbPool,
        category_id: DbId,
        exclude_banned: bool,
    ) -> Result<Vec<Account>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM accounts \
             WHERE category_id = ?1 AND (?2 = 0 OR banned = 0) \
             ORDER BY id"
        );
        sqlx::query_as::<_, Account>(&query)
            .bind(category_id)
            .bind(exclude_banned)
            .fetch_all(pool)
            .await
    }

    /// Persist a check's verdict onto one account.
    pub async fn update_flags(
        pool: &DbPool,
        id: DbId,
        used: bool,
        banned: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts SET used = ?2, banned = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(used)
        .bind(banned)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count accounts by state for a category.
    pub async fn count_stats(pool: &DbPool, category_id: DbId) -> Result<AccountStats, sqlx::Error> {
        sqlx::query_as::<_, AccountStats>(
            "SELECT \
                COUNT(*) AS total, \
                COALESCE(SUM(used), 0) AS used, \
                COALESCE(SUM(banned), 0) AS banned, \
                COALESCE(SUM(CASE WHEN used = 0 AND banned = 0 THEN 1 ELSE 0 END), 0) AS available \
             FROM accounts WHERE category_id = ?1",
        )
        .bind(category_id)
        .fetch_one(pool)
        .await
    }
}
