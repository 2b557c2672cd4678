//! In-memory collaborators for exercising the orchestrator without a
//! database or an interpreter.
//!
//! [`MemoryStore`] mirrors the constraints of the SQL schema that the
//! orchestrator relies on (status transitions, `processed <= total`,
//! running runs are never deleted). [`FakeExecutor`] reads the rendered
//! script, recovers the payload from its trailer and answers with a
//! scripted outcome.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use account_hub_core::error::CoreError;
use account_hub_core::scripting::executor::{
    ScriptError, ScriptExecutor, ScriptInput, ScriptOutput,
};
use account_hub_core::types::{DbId, Timestamp};
use account_hub_core::validation::render::rendered_payload;
use account_hub_core::validation::status::RunStatus;
use account_hub_core::validation::{DEFAULT_CRON, DEFAULT_HISTORY_LIMIT};
use account_hub_db::models::account::Account;
use account_hub_db::models::category::Category;
use account_hub_db::models::validation_run::{
    CreateValidationRun, UpdateValidationRun, ValidationRun,
};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use crate::error::{AppError, AppResult};
use crate::validation::retention::expired_run_ids;
use crate::validation::store::RecordStore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    next_id: DbId,
    categories: BTreeMap<DbId, Category>,
    accounts: BTreeMap<DbId, Account>,
    runs: BTreeMap<DbId, ValidationRun>,
    flag_updates: Vec<DbId>,
    fail_candidates: bool,
    fail_run_creation: bool,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// [`RecordStore`] kept in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a category with the default cron and history limit.
    pub fn add_category(&self, name: &str, script: &str, concurrency: i64) -> DbId {
        let mut tables = lock(&self.tables);
        let id = tables.next_id();
        let now = Utc::now();
        tables.categories.insert(
            id,
            Category {
                id,
                name: name.to_string(),
                validation_script: script.to_string(),
                validation_concurrency: concurrency,
                validation_cron: DEFAULT_CRON.to_string(),
                history_limit: DEFAULT_HISTORY_LIMIT,
                last_validated_at: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    fn edit_category(&self, id: DbId, edit: impl FnOnce(&mut Category)) {
        if let Some(category) = lock(&self.tables).categories.get_mut(&id) {
            edit(category);
        }
    }

    pub fn set_script(&self, id: DbId, script: &str) {
        self.edit_category(id, |c| c.validation_script = script.to_string());
    }

    pub fn set_cron(&self, id: DbId, cron: &str) {
        self.edit_category(id, |c| c.validation_cron = cron.to_string());
    }

    pub fn set_history_limit(&self, id: DbId, limit: i64) {
        self.edit_category(id, |c| c.history_limit = limit);
    }

    pub fn category(&self, id: DbId) -> Option<Category> {
        lock(&self.tables).categories.get(&id).cloned()
    }

    /// Add unflagged accounts. Returns their IDs in order.
    pub fn add_accounts(&self, category_id: DbId, payloads: &[&str]) -> Vec<DbId> {
        let mut tables = lock(&self.tables);
        let now = Utc::now();
        payloads
            .iter()
            .map(|payload| {
                let id = tables.next_id();
                tables.accounts.insert(
                    id,
                    Account {
                        id,
                        category_id,
                        used: false,
                        banned: false,
                        data: (*payload).to_string(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                id
            })
            .collect()
    }

    /// Set flags directly, bypassing the update log.
    pub fn set_flags(&self, account_id: DbId, used: bool, banned: bool) {
        if let Some(account) = lock(&self.tables).accounts.get_mut(&account_id) {
            account.used = used;
            account.banned = banned;
        }
    }

    pub fn account(&self, id: DbId) -> Option<Account> {
        lock(&self.tables).accounts.get(&id).cloned()
    }

    /// Accounts whose flags were written through the store, in write order.
    pub fn flag_updates(&self) -> Vec<DbId> {
        lock(&self.tables).flag_updates.clone()
    }

    pub fn run(&self, id: DbId) -> Option<ValidationRun> {
        lock(&self.tables).runs.get(&id).cloned()
    }

    /// A category's runs, newest first.
    pub fn runs_for(&self, category_id: DbId) -> Vec<ValidationRun> {
        let tables = lock(&self.tables);
        let mut runs: Vec<ValidationRun> = tables
            .runs
            .values()
            .filter(|run| run.category_id == category_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        runs
    }

    /// Make candidate selection fail.
    pub fn fail_candidates(&self, fail: bool) {
        lock(&self.tables).fail_candidates = fail;
    }

    /// Make run creation fail.
    pub fn fail_run_creation(&self, fail: bool) {
        lock(&self.tables).fail_run_creation = fail;
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_category(&self, id: DbId) -> AppResult<Category> {
        self.category(id)
            .ok_or_else(|| AppError::not_found("category", id))
    }

    async fn list_schedulable_categories(&self) -> AppResult<Vec<Category>> {
        Ok(lock(&self.tables)
            .categories
            .values()
            .filter(|c| c.is_schedulable())
            .cloned()
            .collect())
    }

    async fn list_candidates(
        &self,
        category_id: DbId,
        exclude_banned: bool,
    ) -> AppResult<Vec<Account>> {
        let tables = lock(&self.tables);
        if tables.fail_candidates {
            return Err(AppError::InternalError("candidate query failed".to_string()));
        }
        Ok(tables
            .accounts
            .values()
            .filter(|a| a.category_id == category_id && !(exclude_banned && a.banned))
            .cloned()
            .collect())
    }

    async fn update_flags(&self, account_id: DbId, used: bool, banned: bool) -> AppResult<()> {
        let mut tables = lock(&self.tables);
        let account = tables
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| AppError::not_found("account", account_id))?;
        account.used = used;
        account.banned = banned;
        account.updated_at = Utc::now();
        tables.flag_updates.push(account_id);
        Ok(())
    }

    async fn create_run(&self, input: &CreateValidationRun) -> AppResult<ValidationRun> {
        let mut tables = lock(&self.tables);
        if tables.fail_run_creation {
            return Err(AppError::InternalError("run insert failed".to_string()));
        }
        let id = tables.next_id();
        let run = ValidationRun {
            id,
            category_id: input.category_id,
            status: input.status.as_str().to_string(),
            total_count: input.total_count,
            processed_count: 0,
            banned_count: 0,
            error_message: input.error_message.clone().unwrap_or_default(),
            log: String::new(),
            started_at: input.started_at,
            finished_at: input.finished_at,
        };
        tables.runs.insert(id, run.clone());
        Ok(run)
    }

    async fn update_run(&self, run_id: DbId, input: &UpdateValidationRun) -> AppResult<()> {
        let mut tables = lock(&self.tables);
        let run = tables
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| AppError::not_found("validation run", run_id))?;

        if let Some(to) = input.status {
            let from = run.run_status();
            if !from.can_transition(to) {
                return Err(AppError::Core(CoreError::Conflict(format!(
                    "Run {run_id} cannot move from {from} to {to}"
                ))));
            }
        }
        if let Some(processed) = input.processed_count {
            if processed > run.total_count || processed < run.processed_count {
                return Err(AppError::Core(CoreError::Validation(format!(
                    "Run {run_id} processed count {processed} out of range"
                ))));
            }
            run.processed_count = processed;
        }
        if let Some(status) = input.status {
            run.status = status.as_str().to_string();
        }
        if let Some(banned) = input.banned_count {
            run.banned_count = banned;
        }
        if let Some(message) = &input.error_message {
            run.error_message = message.clone();
        }
        if let Some(log) = &input.log {
            run.log = log.clone();
        }
        if let Some(at) = input.finished_at {
            run.finished_at = Some(at);
        }
        Ok(())
    }

    async fn expired_run_ids(&self, category_id: DbId, keep: usize) -> AppResult<Vec<DbId>> {
        Ok(expired_run_ids(&self.runs_for(category_id), keep))
    }

    async fn delete_runs(&self, run_ids: &[DbId]) -> AppResult<u64> {
        let mut tables = lock(&self.tables);
        let mut deleted = 0;
        for id in run_ids {
            if tables.runs.get(id).is_some_and(|run| !run.is_running()) {
                tables.runs.remove(id);
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn mark_category_validated(&self, category_id: DbId, at: Timestamp) -> AppResult<()> {
        let mut tables = lock(&self.tables);
        let category = tables
            .categories
            .get_mut(&category_id)
            .ok_or_else(|| AppError::not_found("category", category_id))?;
        category.last_validated_at = Some(at);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeExecutor
// ---------------------------------------------------------------------------

/// Scripted response for one payload.
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    /// Print the two booleans and exit 0.
    Verdict { used: bool, banned: bool },
    /// Print this stdout and exit 0.
    Stdout(String),
    /// Exit with a non-zero code.
    Exit { code: i32, stderr: String },
    /// Behave as if the process was killed at its timeout.
    Timeout,
}

impl FakeOutcome {
    fn into_result(self, timeout: Duration) -> Result<ScriptOutput, ScriptError> {
        match self {
            Self::Verdict { used, banned } => Ok(ScriptOutput {
                stdout: format!("{}\n{}\n", py_bool(used), py_bool(banned)),
                ..Default::default()
            }),
            Self::Stdout(stdout) => Ok(ScriptOutput {
                stdout,
                ..Default::default()
            }),
            Self::Exit { code, stderr } => Ok(ScriptOutput {
                stderr,
                exit_code: code,
                ..Default::default()
            }),
            Self::Timeout => Err(ScriptError::Timeout {
                elapsed_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// [`ScriptExecutor`] that answers from a payload-to-outcome table.
///
/// With a gate installed every execution waits for one permit before
/// answering, so tests can hold workers in flight.
pub struct FakeExecutor {
    outcomes: HashMap<String, FakeOutcome>,
    default: FakeOutcome,
    gate: Option<Arc<Semaphore>>,
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self {
            outcomes: HashMap::new(),
            default: FakeOutcome::Verdict {
                used: false,
                banned: false,
            },
            gate: None,
            started: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

impl FakeExecutor {
    /// Every payload answers `(False, False)`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(mut self, payload: &str, outcome: FakeOutcome) -> Self {
        self.outcomes.insert(payload.to_string(), outcome);
        self
    }

    pub fn with_verdict(self, payload: &str, used: bool, banned: bool) -> Self {
        self.with_outcome(payload, FakeOutcome::Verdict { used, banned })
    }

    pub fn with_default(mut self, outcome: FakeOutcome) -> Self {
        self.default = outcome;
        self
    }

    /// Hold each execution until a permit is added to `gate`.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Payloads whose execution began, in start order.
    pub fn started(&self) -> Vec<String> {
        lock(&self.started).clone()
    }

    /// Payloads whose execution returned, in completion order.
    pub fn finished(&self) -> Vec<String> {
        lock(&self.finished).clone()
    }

    /// Highest number of simultaneous executions observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Poll until at least `count` executions have started.
    pub async fn wait_for_started(&self, count: usize) {
        while lock(&self.started).len() < count {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

impl ScriptExecutor for FakeExecutor {
    async fn execute(
        &self,
        script_path: &str,
        input: ScriptInput,
    ) -> Result<ScriptOutput, ScriptError> {
        let rendered = tokio::fs::read_to_string(script_path)
            .await
            .map_err(|e| ScriptError::from_spawn(script_path, e))?;
        let payload = rendered_payload(&rendered).ok_or_else(|| ScriptError::Failed {
            exit_code: 1,
            detail: "NameError: validate call missing".to_string(),
        })?;

        lock(&self.started).push(payload.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        tokio::task::yield_now().await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        lock(&self.finished).push(payload.clone());

        self.outcomes
            .get(&payload)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
            .into_result(input.timeout)
    }
}
