//! Python executor for category check scripts.
//!
//! A category may own a provisioned virtual environment at
//! `{venv_base_dir}/{category_id}`. When one exists the script runs under
//! its interpreter; otherwise it falls back to an ephemeral isolated
//! interpreter (`uv run --isolated --no-project`) that resolves the
//! script's inline metadata on its own.

use std::path::PathBuf;
use std::time::Duration;

use tokio::fs;

use super::executor::{ScriptError, ScriptExecutor, ScriptInput, ScriptOutput};
use super::subprocess;
use crate::types::DbId;

/// Environment variable naming the venv an execution should use.
pub const VENV_DIR_ENV: &str = "VENV_DIR";

/// Executor for Python scripts with per-category venv isolation.
#[derive(Debug, Clone)]
pub struct PythonExecutor {
    /// Root directory holding one venv per category.
    venv_base_dir: String,
    /// Launcher used when no venv is provisioned.
    uv_bin: String,
}

impl PythonExecutor {
    /// Create a new executor with the given venv base directory and `uv` binary.
    pub fn new(venv_base_dir: impl Into<String>, uv_bin: impl Into<String>) -> Self {
        Self {
            venv_base_dir: venv_base_dir.into(),
            uv_bin: uv_bin.into(),
        }
    }

    /// Directory where the category's venv lives (whether or not it exists).
    pub fn venv_dir(&self, category_id: DbId) -> PathBuf {
        PathBuf::from(&self.venv_base_dir).join(category_id.to_string())
    }

    /// The category's venv directory if its interpreter has been provisioned.
    pub async fn provisioned_venv(&self, category_id: DbId) -> Option<String> {
        let dir = self.venv_dir(category_id);
        let python = dir.join("bin").join("python");
        match fs::metadata(&python).await {
            Ok(_) => Some(dir.to_string_lossy().into_owned()),
            Err(_) => None,
        }
    }
}

impl ScriptExecutor for PythonExecutor {
    async fn execute(
        &self,
        script_path: &str,
        input: ScriptInput,
    ) -> Result<ScriptOutput, ScriptError> {
        let mut cmd = match input.env(VENV_DIR_ENV) {
            Some(venv) => {
                let mut cmd = tokio::process::Command::new(format!("{venv}/bin/python"));
                cmd.arg(script_path);
                cmd
            }
            None => {
                let mut cmd = tokio::process::Command::new(&self.uv_bin);
                cmd.args(["run", "--isolated", "--no-project", script_path]);
                cmd
            }
        };
        subprocess::run_command(&mut cmd, input).await
    }

    async fn input_for_category(&self, category_id: DbId, timeout: Duration) -> ScriptInput {
        let mut input = ScriptInput::with_timeout(timeout);
        if let Some(venv) = self.provisioned_venv(category_id).await {
            input.env_vars.push((VENV_DIR_ENV.to_string(), venv));
        }
        input
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
