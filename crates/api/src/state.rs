use std::sync::Arc;

use account_hub_core::scripting::python::PythonExecutor;

use crate::config::ServerConfig;
use crate::validation::ValidationOrchestrator;

/// Orchestrator wired to the real Python executor.
pub type Orchestrator = ValidationOrchestrator<PythonExecutor>;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; inner data is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: account_hub_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Validation scheduling, runs and cancellation.
    pub validation: Arc<Orchestrator>,
}
