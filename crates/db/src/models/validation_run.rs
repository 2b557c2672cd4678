//! Validation run entity model and DTOs.

use account_hub_core::types::{DbId, Timestamp};
use account_hub_core::validation::status::RunStatus;
use serde::Serialize;
use sqlx::FromRow;

/// One execution pass of a category's check over its candidate accounts.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ValidationRun {
    pub id: DbId,
    pub category_id: DbId,
    /// One of `running`, `success`, `stopped`, `failed`.
    pub status: String,
    pub total_count: i64,
    pub processed_count: i64,
    pub banned_count: i64,
    pub error_message: String,
    /// Served separately by the run log endpoint.
    #[serde(skip_serializing)]
    pub log: String,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl ValidationRun {
    /// Parsed status; unknown values are reported as `failed`.
    pub fn run_status(&self) -> RunStatus {
        self.status.parse().unwrap_or(RunStatus::Failed)
    }

    pub fn is_running(&self) -> bool {
        self.run_status() == RunStatus::Running
    }
}

/// DTO for inserting a run record.
#[derive(Debug, Clone)]
pub struct CreateValidationRun {
    pub category_id: DbId,
    pub status: RunStatus,
    pub total_count: i64,
    pub error_message: Option<String>,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl CreateValidationRun {
    /// A run that starts in the `running` state.
    pub fn running(category_id: DbId, total_count: i64, started_at: Timestamp) -> Self {
        Self {
            category_id,
            status: RunStatus::Running,
            total_count,
            error_message: None,
            started_at,
            finished_at: None,
        }
    }

    /// A run that could not start, recorded directly as `failed`.
    pub fn failed(category_id: DbId, error_message: String, at: Timestamp) -> Self {
        Self {
            category_id,
            status: RunStatus::Failed,
            total_count: 0,
            error_message: Some(error_message),
            started_at: at,
            finished_at: Some(at),
        }
    }
}

/// Partial update of a run record. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateValidationRun {
    pub status: Option<RunStatus>,
    pub processed_count: Option<i64>,
    pub banned_count: Option<i64>,
    pub error_message: Option<String>,
    pub log: Option<String>,
    pub finished_at: Option<Timestamp>,
}

impl UpdateValidationRun {
    pub fn processed(count: i64) -> Self {
        Self {
            processed_count: Some(count),
            ..Default::default()
        }
    }

    pub fn log(log: String) -> Self {
        Self {
            log: Some(log),
            ..Default::default()
        }
    }

    /// Final transition: terminal status, banned tally and finish time.
    pub fn finish(status: RunStatus, banned_count: i64, finished_at: Timestamp) -> Self {
        Self {
            status: Some(status),
            banned_count: Some(banned_count),
            finished_at: Some(finished_at),
            ..Default::default()
        }
    }
}
