//! Processed and banned tallies shared by a run's workers.

use std::sync::Arc;

use account_hub_core::types::DbId;
use account_hub_db::models::validation_run::UpdateValidationRun;
use tokio::sync::Mutex;

use super::store::RecordStore;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub processed: i64,
    pub banned: i64,
}

/// Counters for one run. Increment and persist happen under one lock so
/// concurrent workers never write a stale processed count.
pub struct RunProgress {
    run_id: DbId,
    store: Arc<dyn RecordStore>,
    tally: Mutex<Tally>,
}

impl RunProgress {
    pub fn new(run_id: DbId, store: Arc<dyn RecordStore>) -> Self {
        Self {
            run_id,
            store,
            tally: Mutex::new(Tally::default()),
        }
    }

    /// Count one finished record and persist the processed count.
    pub async fn record(&self, banned: bool) -> Tally {
        let mut tally = self.tally.lock().await;
        tally.processed += 1;
        if banned {
            tally.banned += 1;
        }

        let update = UpdateValidationRun::processed(tally.processed);
        if let Err(e) = self.store.update_run(self.run_id, &update).await {
            tracing::error!(run_id = self.run_id, error = %e, "Failed to persist run progress");
        }
        *tally
    }

    pub async fn snapshot(&self) -> Tally {
        *self.tally.lock().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
