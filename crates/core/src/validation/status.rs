//! Validation run statuses.
//!
//! Stored as lowercase text in `validation_runs.status`. A run is created
//! `running` and moves exactly once to one of the terminal states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Stopped,
    Failed,
}

impl RunStatus {
    /// Database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transitions are allowed.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Check whether a transition from `self` to `to` is valid.
    pub fn can_transition(self, to: RunStatus) -> bool {
        self == Self::Running && to.is_terminal()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "stopped" => Ok(Self::Stopped),
            "failed" => Ok(Self::Failed),
            other => Err(format!("Unknown run status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
