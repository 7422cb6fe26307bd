use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one workflow run. Terminal states are `Completed`,
/// `HaltedByValidation`, and `AbortedByError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Running,
    Completed,
    HaltedByValidation,
    AbortedByError,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::HaltedByValidation | RunState::AbortedByError
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Pending => write!(f, "pending"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::HaltedByValidation => write!(f, "halted_by_validation"),
            RunState::AbortedByError => write!(f, "aborted_by_error"),
        }
    }
}

impl From<&str> for RunState {
    fn from(s: &str) -> Self {
        match s {
            "running" => RunState::Running,
            "completed" => RunState::Completed,
            "halted_by_validation" => RunState::HaltedByValidation,
            "aborted_by_error" => RunState::AbortedByError,
            _ => RunState::Pending,
        }
    }
}
