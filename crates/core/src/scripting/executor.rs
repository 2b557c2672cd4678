//! The executor seam: what goes into a script run and what comes back.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// Settings for one script run.
#[derive(Debug, Clone)]
pub struct ScriptInput {
    /// Extra `KEY=value` pairs exported to the child.
    pub env_vars: Vec<(String, String)>,
    /// Directory to run in. `None` inherits the server's.
    pub working_directory: Option<String>,
    /// Hard wall-clock limit; the child is killed past it.
    pub timeout: Duration,
}

impl ScriptInput {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            env_vars: Vec::new(),
            working_directory: None,
            timeout,
        }
    }

    pub fn env(&self, key: &str) -> Option<&str> {
        self.env_vars
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
    }
}

/// What a finished script left behind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the process died to a signal.
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl ScriptOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Both streams trimmed and joined by a newline, skipping empty ones.
    pub fn combined(&self) -> String {
        [self.stdout.trim(), self.stderr.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Why a script could not produce a [`ScriptOutput`].
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Script not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Script timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Raised by executors that treat a non-zero exit as fatal.
    #[error("Script failed with exit code {exit_code}: {detail}")]
    Failed { exit_code: i32, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScriptError {
    /// Map a failed `spawn` of `program` onto the matching variant.
    pub fn from_spawn(program: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(program.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(program.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// Runs a script file and hands back its output.
///
/// A script that runs and exits non-zero is still `Ok`; callers inspect
/// [`ScriptOutput::exit_code`]. Errors mean the run itself went wrong.
pub trait ScriptExecutor: Send + Sync {
    fn execute(
        &self,
        script_path: &str,
        input: ScriptInput,
    ) -> impl std::future::Future<Output = Result<ScriptOutput, ScriptError>> + Send;

    /// Execution settings for a script owned by `category_id`.
    ///
    /// Executors with per-category environments override this to point the
    /// run at them.
    fn input_for_category(
        &self,
        category_id: DbId,
        timeout: Duration,
    ) -> impl std::future::Future<Output = ScriptInput> + Send {
        let _ = category_id;
        std::future::ready(ScriptInput::with_timeout(timeout))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
