//! Append-only text log scoped to one validation run.

use std::sync::Arc;

use account_hub_core::types::DbId;
use account_hub_db::models::validation_run::UpdateValidationRun;
use chrono::Local;
use tokio::sync::Mutex;

use super::store::RecordStore;

/// Log buffer for a single run.
///
/// Appends are serialised under one lock, and every append writes the
/// whole accumulated buffer to the run record, so readers of the record
/// always see a prefix of the final log.
pub struct RunLog {
    run_id: DbId,
    store: Arc<dyn RecordStore>,
    buffer: Mutex<String>,
}

impl RunLog {
    pub fn new(run_id: DbId, store: Arc<dyn RecordStore>) -> Self {
        Self {
            run_id,
            store,
            buffer: Mutex::new(String::new()),
        }
    }

    /// Append one timestamped line and persist the buffer.
    ///
    /// A failed write is logged and otherwise ignored; the next append
    /// carries the full buffer again.
    pub async fn append(&self, line: &str) {
        let mut buffer = self.buffer.lock().await;
        buffer.push_str(&format!("[{}] {line}\n", Local::now().format("%H:%M:%S")));

        let update = UpdateValidationRun::log(buffer.clone());
        if let Err(e) = self.store.update_run(self.run_id, &update).await {
            tracing::error!(run_id = self.run_id, error = %e, "Failed to persist run log");
        }
    }

    /// Current buffer contents.
    pub async fn contents(&self) -> String {
        self.buffer.lock().await.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
