//! Per-category cron triggers.
//!
//! Each scheduled category owns one tokio task that sleeps until the next
//! matching minute (local time) and then starts a run. The task re-reads
//! the category on every fire so edits made since scheduling apply.

use std::collections::HashMap;
use std::sync::Arc;

use account_hub_core::cron::CronSchedule;
use account_hub_core::error::CoreError;
use account_hub_core::scripting::executor::ScriptExecutor;
use account_hub_core::types::DbId;
use account_hub_db::models::category::Category;
use chrono::{DateTime, Local, TimeZone};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::executor::ValidationService;
use crate::error::{AppError, AppResult};

struct ScheduledJob {
    schedule: CronSchedule,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledJob {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Owns the scheduled trigger of every category.
pub struct CronRegistry<E> {
    service: Arc<ValidationService<E>>,
    jobs: Mutex<HashMap<DbId, ScheduledJob>>,
    shutdown: CancellationToken,
}

impl<E: ScriptExecutor + 'static> CronRegistry<E> {
    pub fn new(service: Arc<ValidationService<E>>) -> Self {
        Self {
            service,
            jobs: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Drop every trigger and schedule each eligible category afresh.
    ///
    /// Returns the number of categories now scheduled.
    pub async fn schedule_all(&self) -> AppResult<usize> {
        let mut jobs = self.jobs.lock().await;
        for (_, job) in jobs.drain() {
            job.stop();
        }

        let categories = self.service.store().list_schedulable_categories().await?;
        for category in &categories {
            self.add_job(&mut jobs, category);
        }

        tracing::info!(
            eligible = categories.len(),
            scheduled = jobs.len(),
            "Validation schedules loaded"
        );
        Ok(jobs.len())
    }

    /// Replace one category's trigger, leaving the others untouched.
    ///
    /// Returns whether the category is scheduled afterwards.
    pub async fn schedule_one(&self, category_id: DbId) -> AppResult<bool> {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.remove(&category_id) {
            job.stop();
        }

        let category = match self.service.store().get_category(category_id).await {
            Ok(category) => category,
            Err(AppError::Core(CoreError::NotFound { .. })) => return Ok(false),
            Err(e) => return Err(e),
        };
        if !category.is_schedulable() {
            tracing::debug!(category_id, "Category has no schedule");
            return Ok(false);
        }
        Ok(self.add_job(&mut jobs, &category))
    }

    /// Remove a category's trigger. Returns whether one existed.
    pub async fn unschedule(&self, category_id: DbId) -> bool {
        match self.jobs.lock().await.remove(&category_id) {
            Some(job) => {
                job.stop();
                tracing::info!(category_id, "Validation schedule removed");
                true
            }
            None => false,
        }
    }

    /// Scheduled category IDs, sorted.
    pub async fn scheduled_categories(&self) -> Vec<DbId> {
        let mut ids: Vec<DbId> = self.jobs.lock().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// When the category's trigger fires next, if it is scheduled.
    pub async fn next_fire(&self, category_id: DbId) -> Option<DateTime<Local>> {
        let jobs = self.jobs.lock().await;
        let job = jobs.get(&category_id)?;
        job.schedule.next_after_in(&Local::now())
    }

    /// Stop every trigger. Runs already in progress are not affected.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut jobs = self.jobs.lock().await;
        let count = jobs.len();
        for (_, job) in jobs.drain() {
            job.stop();
        }
        tracing::info!(count, "Validation scheduler stopped");
    }

    fn add_job(&self, jobs: &mut HashMap<DbId, ScheduledJob>, category: &Category) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }

        let schedule = match CronSchedule::parse(&category.validation_cron) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::error!(
                    category_id = category.id,
                    cron = %category.validation_cron,
                    error = %e,
                    "Failed to schedule validation"
                );
                return false;
            }
        };

        let cancel = self.shutdown.child_token();
        let handle = tokio::spawn(run_trigger(
            Arc::clone(&self.service),
            category.id,
            schedule.clone(),
            cancel.clone(),
        ));
        tracing::info!(category_id = category.id, cron = %schedule, "Validation scheduled");
        jobs.insert(
            category.id,
            ScheduledJob {
                schedule,
                cancel,
                handle,
            },
        );
        true
    }
}

/// Sleep until each firing time and start a run, until cancelled.
async fn run_trigger<E: ScriptExecutor + 'static>(
    service: Arc<ValidationService<E>>,
    category_id: DbId,
    schedule: CronSchedule,
    cancel: CancellationToken,
) {
    let mut last_fire: Option<DateTime<Local>> = None;
    loop {
        let now = Local::now();
        let Some(next) = next_trigger(&schedule, &now, last_fire.as_ref()) else {
            tracing::warn!(category_id, cron = %schedule, "Cron schedule never fires");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(wait) => {}
        }

        fire(&service, category_id).await;
        last_fire = Some(next);
    }
}

/// The next firing time after both `now` and the previous fire.
///
/// A timer that wakes early, or a wall clock stepped backwards, must not
/// fire an instant that already fired.
fn next_trigger<Tz: TimeZone>(
    schedule: &CronSchedule,
    now: &DateTime<Tz>,
    last_fire: Option<&DateTime<Tz>>,
) -> Option<DateTime<Tz>> {
    let from = match last_fire {
        Some(previous) if previous > now => previous,
        _ => now,
    };
    schedule.next_after_in(from)
}

/// Start a scheduled run with the category's current settings.
pub(crate) async fn fire<E: ScriptExecutor + 'static>(
    service: &Arc<ValidationService<E>>,
    category_id: DbId,
) {
    let category = match service.store().get_category(category_id).await {
        Ok(category) => category,
        Err(e) => {
            tracing::error!(category_id, error = %e, "Failed to load category for scheduled run");
            return;
        }
    };

    match service.start_run_for(category) {
        Ok(_) => tracing::info!(category_id, "Scheduled validation started"),
        Err(AppError::Core(CoreError::Conflict(_))) => {
            tracing::info!(category_id, "Skipping scheduled validation, a run is in progress");
        }
        Err(e) => tracing::warn!(category_id, error = %e, "Scheduled validation not started"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
