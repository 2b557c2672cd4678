//! Drives one validation run for one category.
//!
//! A run selects the category's unbanned accounts, records a `running`
//! run, trims history, then feeds the accounts through a [`WorkerPool`]
//! sized by the category's concurrency. Each worker renders the check
//! script for its account, executes it, and persists the verdict. A stop
//! request halts dispatch; workers already started run to completion
//! before the run is finalised as `stopped`.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use account_hub_core::error::CoreError;
use account_hub_core::scripting::executor::ScriptExecutor;
use account_hub_core::types::DbId;
use account_hub_core::validation::run_worker_count;
use account_hub_core::validation::render::render_check_script;
use account_hub_core::validation::status::RunStatus;
use account_hub_core::validation::verdict::parse_verdict;
use account_hub_db::models::account::Account;
use account_hub_db::models::category::Category;
use account_hub_db::models::validation_run::{CreateValidationRun, UpdateValidationRun};
use chrono::Utc;
use serde::Serialize;
use tempfile::TempPath;
use tokio::task::JoinHandle;

use super::progress::RunProgress;
use super::registry::{RunGuard, RunRegistry};
use super::retention::trim_history;
use super::run_log::RunLog;
use super::store::RecordStore;
use super::worker_pool::WorkerPool;
use crate::error::{AppError, AppResult};

/// Outcome of a finished run attempt.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: DbId,
    pub status: RunStatus,
    pub total: i64,
    pub processed: i64,
    pub banned: i64,
}

/// Starts runs and tracks them in its [`RunRegistry`].
pub struct ValidationService<E> {
    store: Arc<dyn RecordStore>,
    executor: Arc<E>,
    registry: Arc<RunRegistry>,
    check_timeout: Duration,
}

impl<E: ScriptExecutor + 'static> ValidationService<E> {
    pub fn new(store: Arc<dyn RecordStore>, executor: Arc<E>, check_timeout: Duration) -> Self {
        Self {
            store,
            executor,
            registry: Arc::new(RunRegistry::new()),
            check_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// Load the category and start a run in the background.
    pub async fn start_run(
        self: &Arc<Self>,
        category_id: DbId,
    ) -> AppResult<JoinHandle<Option<RunSummary>>> {
        let category = self.store.get_category(category_id).await?;
        self.start_run_for(category)
    }

    /// Start a run for an already-loaded category.
    ///
    /// Fails with `NotConfigured` if the category has no script and with
    /// `Conflict` if it already has an active run. The registry slot is
    /// taken before the task is spawned.
    pub fn start_run_for(
        self: &Arc<Self>,
        category: Category,
    ) -> AppResult<JoinHandle<Option<RunSummary>>> {
        if !category.has_script() {
            return Err(AppError::Core(CoreError::NotConfigured(format!(
                "Category {} has no validation script",
                category.id
            ))));
        }

        let guard = self.registry.try_register(category.id).ok_or_else(|| {
            AppError::Core(CoreError::Conflict(format!(
                "Category {} already has a validation run in progress",
                category.id
            )))
        })?;

        let service = Arc::clone(self);
        Ok(tokio::spawn(async move { service.execute_run(category, guard).await }))
    }

    /// Cancel the category's active run. Returns whether one was active.
    pub fn stop(&self, category_id: DbId) -> bool {
        let stopped = self.registry.stop(category_id);
        if stopped {
            tracing::info!(category_id, "Validation stop requested");
        }
        stopped
    }

    async fn execute_run(&self, category: Category, guard: RunGuard) -> Option<RunSummary> {
        let category_id = category.id;
        tracing::info!(category_id, name = %category.name, "Starting validation run");

        let candidates = match self.store.list_candidates(category_id, true).await {
            Ok(candidates) => candidates,
            Err(e) => {
                self.record_failed_start(category_id, &e).await;
                return None;
            }
        };
        let total = candidates.len() as i64;

        let run = match self
            .store
            .create_run(&CreateValidationRun::running(category_id, total, Utc::now()))
            .await
        {
            Ok(run) => run,
            Err(e) => {
                tracing::error!(category_id, error = %e, "Failed to create validation run");
                return None;
            }
        };
        let run_id = run.id;
        let unfinished = UnfinishedRun::new(run_id, Arc::clone(&self.store));

        trim_history(self.store.as_ref(), category_id, category.history_limit).await;

        let context = Arc::new(RunContext {
            run_id,
            category_id,
            script: category.validation_script,
            executor: Arc::clone(&self.executor),
            store: Arc::clone(&self.store),
            log: RunLog::new(run_id, Arc::clone(&self.store)),
            progress: RunProgress::new(run_id, Arc::clone(&self.store)),
            timeout: self.check_timeout,
        });

        context
            .log
            .append(&format!("Starting validation for {total} accounts"))
            .await;

        let cancel = guard.token().clone();
        let mut pool = WorkerPool::new(run_worker_count(
            category.validation_concurrency,
            candidates.len(),
        ));
        tracing::debug!(run_id, total, workers = pool.size(), "Dispatching accounts");

        for account in candidates {
            let Some(slot) = pool.acquire(&cancel).await else {
                break;
            };
            let worker = slot.id();
            let context = Arc::clone(&context);
            pool.spawn(slot, async move { context.check(worker, account).await });
        }

        let panicked = pool.drain().await;
        if panicked > 0 {
            tracing::error!(run_id, panicked, "Validation workers panicked");
        }

        let tally = context.progress.snapshot().await;
        let status = if cancel.is_cancelled() {
            RunStatus::Stopped
        } else {
            RunStatus::Success
        };
        let verb = match status {
            RunStatus::Stopped => "Stopped",
            _ => "Completed",
        };
        context
            .log
            .append(&format!(
                "{verb}: {} processed, {} banned",
                tally.processed, tally.banned
            ))
            .await;

        let finished_at = Utc::now();
        if let Err(e) = self
            .store
            .update_run(
                run_id,
                &UpdateValidationRun::finish(status, tally.banned, finished_at),
            )
            .await
        {
            tracing::error!(run_id, error = %e, "Failed to finalise validation run");
        }
        unfinished.disarm();
        if let Err(e) = self
            .store
            .mark_category_validated(category_id, finished_at)
            .await
        {
            tracing::error!(category_id, error = %e, "Failed to update last validated time");
        }

        trim_history(self.store.as_ref(), category_id, category.history_limit).await;

        tracing::info!(
            category_id,
            run_id,
            status = %status,
            processed = tally.processed,
            banned = tally.banned,
            "Validation run finished"
        );
        drop(guard);

        Some(RunSummary {
            run_id,
            status,
            total,
            processed: tally.processed,
            banned: tally.banned,
        })
    }

    /// Record a run that could not select its candidates.
    async fn record_failed_start(&self, category_id: DbId, error: &AppError) {
        tracing::error!(category_id, error = %error, "Failed to load validation candidates");
        let failed = CreateValidationRun::failed(
            category_id,
            format!("Failed to load accounts: {error}"),
            Utc::now(),
        );
        if let Err(e) = self.store.create_run(&failed).await {
            tracing::error!(category_id, error = %e, "Failed to record failed validation run");
        }
    }
}

/// Marks a created run `failed` if its task ends before finalising it.
///
/// A panic or dropped task would otherwise leave the record `running`
/// forever, and running records are never trimmed.
struct UnfinishedRun {
    run_id: DbId,
    store: Arc<dyn RecordStore>,
    armed: bool,
}

impl UnfinishedRun {
    fn new(run_id: DbId, store: Arc<dyn RecordStore>) -> Self {
        Self {
            run_id,
            store,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for UnfinishedRun {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let run_id = self.run_id;
        tracing::error!(run_id, "Validation run ended before finalising");
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let store = Arc::clone(&self.store);
        runtime.spawn(async move {
            let update = UpdateValidationRun {
                status: Some(RunStatus::Failed),
                error_message: Some("Run aborted before completion".to_string()),
                finished_at: Some(Utc::now()),
                ..Default::default()
            };
            if let Err(e) = store.update_run(run_id, &update).await {
                tracing::error!(run_id, error = %e, "Failed to mark aborted run as failed");
            }
        });
    }
}

/// State shared by the workers of one run.
struct RunContext<E> {
    run_id: DbId,
    category_id: DbId,
    script: String,
    executor: Arc<E>,
    store: Arc<dyn RecordStore>,
    log: RunLog,
    progress: RunProgress,
    timeout: Duration,
}

impl<E: ScriptExecutor + 'static> RunContext<E> {
    /// Check one account; it counts as processed whatever the outcome.
    async fn check(&self, worker: usize, account: Account) {
        let banned = self.check_account(worker, &account).await;
        self.progress.record(banned).await;
    }

    /// Returns whether the account was found banned.
    async fn check_account(&self, worker: usize, account: &Account) -> bool {
        let prefix = format!("[W{worker}] Account {}:", account.id);

        let rendered = render_check_script(&self.script, &account.data);
        let script_path = match write_script_file(&rendered).await {
            Ok(path) => path,
            Err(e) => {
                self.fail(&prefix, account.id, format!("creating script file: {e}"))
                    .await;
                return false;
            }
        };

        let input = self
            .executor
            .input_for_category(self.category_id, self.timeout)
            .await;
        let result = self
            .executor
            .execute(&script_path.to_string_lossy(), input)
            .await;
        drop(script_path);

        let output = match result {
            Ok(output) if output.success() => output,
            Ok(output) => {
                let detail = output.combined();
                let message = if detail.is_empty() {
                    format!("exit code {}", output.exit_code)
                } else {
                    format!("exit code {}: {detail}", output.exit_code)
                };
                self.fail(&prefix, account.id, message).await;
                return false;
            }
            Err(e) => {
                self.fail(&prefix, account.id, e.to_string()).await;
                return false;
            }
        };

        let verdict = match parse_verdict(&output.stdout) {
            Ok(verdict) => verdict,
            Err(e) => {
                self.fail(&prefix, account.id, format!("{e}: {}", output.combined()))
                    .await;
                return false;
            }
        };

        let stderr_lines = output
            .stderr
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty());
        for line in verdict.diagnostics.iter().map(String::as_str).chain(stderr_lines) {
            self.log.append(&format!("{prefix} {line}")).await;
        }

        if let Err(e) = self
            .store
            .update_flags(account.id, verdict.used, verdict.banned)
            .await
        {
            self.fail(&prefix, account.id, format!("saving result: {e}"))
                .await;
            return false;
        }

        self.log
            .append(&format!("{prefix} {}", verdict.label()))
            .await;
        verdict.banned
    }

    async fn fail(&self, prefix: &str, account_id: DbId, detail: String) {
        tracing::warn!(run_id = self.run_id, account_id, error = %detail, "Account check failed");
        self.log.append(&format!("{prefix} ERROR - {detail}")).await;
    }
}

/// Write a rendered script to a fresh temporary file on the blocking pool.
///
/// The file is deleted when the returned path is dropped.
pub(crate) async fn write_script_file(rendered: &str) -> std::io::Result<TempPath> {
    let rendered = rendered.to_owned();
    tokio::task::spawn_blocking(move || -> std::io::Result<TempPath> {
        let mut file = tempfile::Builder::new()
            .prefix("validate-")
            .suffix(".py")
            .tempfile()?;
        file.write_all(rendered.as_bytes())?;
        file.flush()?;
        Ok(file.into_temp_path())
    })
    .await
    .map_err(std::io::Error::other)?
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
