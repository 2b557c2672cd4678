//! Trimming of a category's run history.

use account_hub_core::types::DbId;
use account_hub_core::validation::effective_history_limit;
use account_hub_db::models::validation_run::ValidationRun;

use super::store::RecordStore;

/// Finished runs beyond the newest `limit`, ordered by start time then ID.
///
/// Running runs are neither counted nor returned. In-memory counterpart of
/// the SQL cutoff behind [`RecordStore::expired_run_ids`].
pub fn expired_run_ids(runs: &[ValidationRun], limit: usize) -> Vec<DbId> {
    let mut finished: Vec<&ValidationRun> = runs.iter().filter(|run| !run.is_running()).collect();
    finished.sort_by(|a, b| {
        b.started_at
            .cmp(&a.started_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    finished.into_iter().skip(limit).map(|run| run.id).collect()
}

/// Delete a category's finished runs beyond its history limit.
///
/// A limit below 1 means the default. Failures are logged and reported
/// as zero deletions.
pub async fn trim_history(store: &dyn RecordStore, category_id: DbId, history_limit: i64) -> u64 {
    let limit = effective_history_limit(history_limit);

    let expired = match store.expired_run_ids(category_id, limit).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(category_id, error = %e, "Failed to list runs for retention");
            return 0;
        }
    };
    if expired.is_empty() {
        return 0;
    }

    match store.delete_runs(&expired).await {
        Ok(deleted) => {
            tracing::info!(category_id, limit, deleted, "Trimmed validation run history");
            deleted
        }
        Err(e) => {
            tracing::error!(category_id, error = %e, "Failed to trim validation run history");
            0
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
