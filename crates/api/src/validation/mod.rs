//! Validation orchestrator.
//!
//! - [`scheduler`]: cron trigger per category.
//! - [`executor`]: one run from candidate selection to finalisation.
//! - [`worker_pool`]: bounded slots the run dispatches accounts onto.
//! - [`run_log`] and [`progress`]: per-run log buffer and counters.
//! - [`registry`]: active runs and their cancellation tokens.
//! - [`retention`]: run history trimming.
//!
//! All storage access goes through [`store::RecordStore`].

pub mod executor;
pub mod orchestrator;
pub mod progress;
pub mod registry;
pub mod retention;
pub mod run_log;
pub mod scheduler;
pub mod store;
pub mod worker_pool;

pub use orchestrator::{ScriptTestResult, ValidationOrchestrator};
pub use store::{RecordStore, SqlRecordStore};
