//! Entry point used by handlers and the binary.

use std::sync::Arc;
use std::time::Duration;

use account_hub_core::scripting::executor::ScriptExecutor;
use account_hub_core::types::DbId;
use account_hub_core::validation::render::render_check_script;
use account_hub_core::validation::verdict::parse_verdict;
use serde::Serialize;
use tokio::task::JoinHandle;

use super::executor::{write_script_file, RunSummary, ValidationService};
use super::scheduler::CronRegistry;
use super::store::RecordStore;
use crate::error::{AppError, AppResult};

/// Result of an ad-hoc script test.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptTestResult {
    pub success: bool,
    pub used: Option<bool>,
    pub banned: Option<bool>,
    /// Combined process output.
    pub output: String,
    pub error: Option<String>,
}

/// Scheduling, on-demand runs, cancellation and script tests.
pub struct ValidationOrchestrator<E> {
    service: Arc<ValidationService<E>>,
    scheduler: CronRegistry<E>,
    test_timeout: Duration,
}

impl<E: ScriptExecutor + 'static> ValidationOrchestrator<E> {
    pub fn new(
        store: Arc<dyn RecordStore>,
        executor: Arc<E>,
        check_timeout: Duration,
        test_timeout: Duration,
    ) -> Self {
        let service = Arc::new(ValidationService::new(store, executor, check_timeout));
        Self {
            scheduler: CronRegistry::new(Arc::clone(&service)),
            service,
            test_timeout,
        }
    }

    pub fn service(&self) -> &Arc<ValidationService<E>> {
        &self.service
    }

    pub fn scheduler(&self) -> &CronRegistry<E> {
        &self.scheduler
    }

    /// Start a run now and return without waiting for it.
    pub async fn run_now(&self, category_id: DbId) -> AppResult<()> {
        self.start(category_id).await.map(|_| ())
    }

    /// Like [`run_now`](Self::run_now), returning the run's task handle.
    pub async fn start(&self, category_id: DbId) -> AppResult<JoinHandle<Option<RunSummary>>> {
        self.service.start_run(category_id).await
    }

    pub fn stop(&self, category_id: DbId) -> bool {
        self.service.stop(category_id)
    }

    pub fn is_running(&self, category_id: DbId) -> bool {
        self.service.registry().is_active(category_id)
    }

    pub async fn schedule_all(&self) -> AppResult<usize> {
        self.scheduler.schedule_all().await
    }

    pub async fn schedule_one(&self, category_id: DbId) -> AppResult<bool> {
        self.scheduler.schedule_one(category_id).await
    }

    pub async fn unschedule(&self, category_id: DbId) -> bool {
        self.scheduler.unschedule(category_id).await
    }

    /// Stop the scheduler. In-flight runs continue to completion.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        let active = self.service.registry().active_categories();
        if !active.is_empty() {
            tracing::info!(?active, "Validation runs still in progress at shutdown");
        }
    }

    /// Run `script` once against `payload` in the category's environment.
    ///
    /// Nothing is persisted.
    pub async fn test_script(
        &self,
        category_id: DbId,
        script: &str,
        payload: &str,
    ) -> AppResult<ScriptTestResult> {
        if script.trim().is_empty() {
            return Err(AppError::BadRequest("script is required".to_string()));
        }

        let rendered = render_check_script(script, payload);
        let script_path = write_script_file(&rendered)
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to write script file: {e}")))?;

        let executor = self.service.executor();
        let input = executor
            .input_for_category(category_id, self.test_timeout)
            .await;
        let result = executor.execute(&script_path.to_string_lossy(), input).await;
        drop(script_path);

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                return Ok(ScriptTestResult {
                    error: Some(e.to_string()),
                    ..Default::default()
                })
            }
        };

        let combined = output.combined();
        if !output.success() {
            return Ok(ScriptTestResult {
                error: Some(format!("Script exited with code {}", output.exit_code)),
                output: combined,
                ..Default::default()
            });
        }

        Ok(match parse_verdict(&output.stdout) {
            Ok(verdict) => ScriptTestResult {
                success: true,
                used: Some(verdict.used),
                banned: Some(verdict.banned),
                output: combined,
                error: None,
            },
            Err(e) => ScriptTestResult {
                error: Some(e.to_string()),
                output: combined,
                ..Default::default()
            },
        })
    }
}
