//! Step Result Structures
//!
//! Every step invocation produces exactly one `StepResult`, even when the
//! step body faults. Failures are data, not `Err`: the runner inspects them
//! to decide whether the run continues, halts, or aborts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Outcome of a single step invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepResult {
    Success {
        data: Value,
    },
    Failure {
        kind: FailureKind,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    /// Canonical skip marker, distinct from both Success and Failure so that
    /// downstream `run_when` gates propagate skips transitively.
    Skipped {
        reason: SkipReason,
    },
}

/// Failure taxonomy. Only `Fatal` aborts a whole run; everything else is a
/// soft failure local to the owning step (Validate steps excepted, which
/// halt on any failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    #[serde(rename = "validation_error")]
    Validation,
    #[serde(rename = "not_found_error")]
    NotFound,
    #[serde(rename = "llm_error")]
    LlmError,
    #[serde(rename = "llm_timeout")]
    LlmTimeout,
    #[serde(rename = "llm_output_invalid")]
    LlmOutputInvalid,
    #[serde(rename = "database_error")]
    Database,
    #[serde(rename = "unexpected_error")]
    Unexpected,
    #[serde(rename = "fatal_error")]
    Fatal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation_error",
            FailureKind::NotFound => "not_found_error",
            FailureKind::LlmError => "llm_error",
            FailureKind::LlmTimeout => "llm_timeout",
            FailureKind::LlmOutputInvalid => "llm_output_invalid",
            FailureKind::Database => "database_error",
            FailureKind::Unexpected => "unexpected_error",
            FailureKind::Fatal => "fatal_error",
        }
    }

    /// Whether this failure aborts the entire run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FailureKind::Fatal)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a step was skipped rather than invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum SkipReason {
    /// A `run_if` predicate evaluated to false.
    PredicateFalse,
    /// The `run_when` upstream step is absent, failed, or was itself skipped.
    UpstreamFailed { step: String },
    /// The Budget Guard denied the reservation. Running out of budget is an
    /// expected steady-state condition, not a failure.
    BudgetExhausted,
}

impl StepResult {
    pub fn success(data: Value) -> Self {
        StepResult::Success { data }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        StepResult::Failure {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn failure_with(kind: FailureKind, message: impl Into<String>, details: Value) -> Self {
        StepResult::Failure {
            kind,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn skipped(reason: SkipReason) -> Self {
        StepResult::Skipped { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StepResult::Failure { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepResult::Skipped { .. })
    }

    /// The success payload, or None for failures and skips.
    pub fn data(&self) -> Option<&Value> {
        match self {
            StepResult::Success { data } => Some(data),
            _ => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            StepResult::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            StepResult::Failure { message, .. } => Some(message),
            _ => None,
        }
    }

    /// JSON view for context snapshots and stream payloads.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Error type returned by Task and Validate handlers. The handler picks its
/// taxonomy entry; the executor converts it into a `StepResult::Failure` at
/// the step boundary.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StepError {
    pub kind: FailureKind,
    pub message: String,
    pub details: Option<Value>,
}

impl StepError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Database, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Validation, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Fatal, message)
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unexpected, message)
    }
}

impl From<StepError> for StepResult {
    fn from(err: StepError) -> Self {
        StepResult::Failure {
            kind: err.kind,
            message: err.message,
            details: err.details,
        }
    }
}
