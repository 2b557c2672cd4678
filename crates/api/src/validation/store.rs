//! The orchestrator's view of durable storage.
//!
//! [`RecordStore`] is the only way validation code reads or writes
//! categories, accounts and runs. [`SqlRecordStore`] backs it with the
//! repositories; tests use the in-memory store from `test_support`.

use account_hub_core::types::{DbId, Timestamp};
use account_hub_db::models::account::Account;
use account_hub_db::models::category::Category;
use account_hub_db::models::validation_run::{
    CreateValidationRun, UpdateValidationRun, ValidationRun,
};
use account_hub_db::repositories::{AccountRepo, CategoryRepo, ValidationRunRepo};
use account_hub_db::DbPool;
use async_trait::async_trait;

use crate::error::{AppError, AppResult};

/// Storage operations consumed by the validation orchestrator.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load a category, failing with `NotFound` if it does not exist.
    async fn get_category(&self, id: DbId) -> AppResult<Category>;

    /// Categories with both a validation script and a cron expression.
    async fn list_schedulable_categories(&self) -> AppResult<Vec<Category>>;

    /// Accounts to check in a run, in ID order.
    async fn list_candidates(
        &self,
        category_id: DbId,
        exclude_banned: bool,
    ) -> AppResult<Vec<Account>>;

    async fn update_flags(&self, account_id: DbId, used: bool, banned: bool) -> AppResult<()>;

    async fn create_run(&self, input: &CreateValidationRun) -> AppResult<ValidationRun>;

    async fn update_run(&self, run_id: DbId, input: &UpdateValidationRun) -> AppResult<()>;

    /// IDs of the category's finished runs beyond the newest `keep`,
    /// ordered by start time then ID. Running runs are never returned.
    async fn expired_run_ids(&self, category_id: DbId, keep: usize) -> AppResult<Vec<DbId>>;

    /// Delete the given runs. Running runs are never deleted.
    async fn delete_runs(&self, run_ids: &[DbId]) -> AppResult<u64>;

    async fn mark_category_validated(&self, category_id: DbId, at: Timestamp) -> AppResult<()>;
}

/// [`RecordStore`] over the SQL repositories.
#[derive(Debug, Clone)]
pub struct SqlRecordStore {
    pool: DbPool,
}

impl SqlRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for SqlRecordStore {
    async fn get_category(&self, id: DbId) -> AppResult<Category> {
        CategoryRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("category", id))
    }

    async fn list_schedulable_categories(&self) -> AppResult<Vec<Category>> {
        Ok(CategoryRepo::list_schedulable(&self.pool).await?)
    }

    async fn list_candidates(
        &self,
        category_id: DbId,
        exclude_banned: bool,
    ) -> AppResult<Vec<Account>> {
        Ok(AccountRepo::list_candidates(&self.pool, category_id, exclude_banned).await?)
    }

    async fn update_flags(&self, account_id: DbId, used: bool, banned: bool) -> AppResult<()> {
        if AccountRepo::update_flags(&self.pool, account_id, used, banned).await? {
            Ok(())
        } else {
            Err(AppError::not_found("account", account_id))
        }
    }

    async fn create_run(&self, input: &CreateValidationRun) -> AppResult<ValidationRun> {
        Ok(ValidationRunRepo::create(&self.pool, input).await?)
    }

    async fn update_run(&self, run_id: DbId, input: &UpdateValidationRun) -> AppResult<()> {
        if ValidationRunRepo::update(&self.pool, run_id, input).await? {
            Ok(())
        } else {
            Err(AppError::not_found("validation run", run_id))
        }
    }

    async fn expired_run_ids(&self, category_id: DbId, keep: usize) -> AppResult<Vec<DbId>> {
        let keep = i64::try_from(keep).unwrap_or(i64::MAX);
        Ok(ValidationRunRepo::list_expired_ids(&self.pool, category_id, keep).await?)
    }

    async fn delete_runs(&self, run_ids: &[DbId]) -> AppResult<u64> {
        Ok(ValidationRunRepo::delete_many(&self.pool, run_ids).await?)
    }

    async fn mark_category_validated(&self, category_id: DbId, at: Timestamp) -> AppResult<()> {
        if CategoryRepo::mark_validated(&self.pool, category_id, at).await? {
            Ok(())
        } else {
            Err(AppError::not_found("category", category_id))
        }
    }
}
