//! Account validation domain logic.
//!
//! Defaults and normalisation for category validation settings, the run
//! status state machine, check-script rendering, and parsing of a check's
//! verdict. Used by the repository layer and the orchestrator alike.

pub mod render;
pub mod status;
pub mod verdict;

use std::time::Duration;

use crate::cron::CronSchedule;
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Concurrency used when a category's setting is unset or below 1.
pub const DEFAULT_CONCURRENCY: i64 = 1;

/// Upper bound on workers per run. Larger settings are clamped to it.
pub const MAX_CONCURRENCY: i64 = 64;

/// Schedule applied when a category has no cron expression (daily at midnight).
pub const DEFAULT_CRON: &str = "0 0 * * *";

/// Run history kept per category when the limit is unset or not positive.
pub const DEFAULT_HISTORY_LIMIT: i64 = 1000;

/// Wall-clock limit for a single record's check.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(60);

/// Wall-clock limit for an ad-hoc script test.
pub const TEST_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of runs returned by the recent-runs listing.
pub const RECENT_RUNS_LIMIT: i64 = 20;

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/// Effective worker count for a stored concurrency value, within
/// `1..=MAX_CONCURRENCY`.
pub fn effective_concurrency(value: i64) -> usize {
    value.clamp(DEFAULT_CONCURRENCY, MAX_CONCURRENCY) as usize
}

/// Workers to start for a run over `candidates` accounts.
///
/// Never more than there are accounts to check, and at least one.
pub fn run_worker_count(setting: i64, candidates: usize) -> usize {
    effective_concurrency(setting).min(candidates.max(1))
}

/// Effective retention limit for a stored history limit.
pub fn effective_history_limit(value: i64) -> usize {
    if value <= 0 {
        DEFAULT_HISTORY_LIMIT as usize
    } else {
        value as usize
    }
}

/// Normalise a cron expression submitted with validation settings.
///
/// Empty input becomes [`DEFAULT_CRON`]; anything else must parse.
pub fn normalize_cron(expression: &str) -> Result<String, CoreError> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_CRON.to_string());
    }
    CronSchedule::parse(trimmed)
        .map(|schedule| schedule.expression().to_string())
        .map_err(|e| CoreError::Validation(format!("Invalid cron expression '{trimmed}': {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
