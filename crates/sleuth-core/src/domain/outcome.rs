//! Outcome model: how a task ended.
//!
//! Execution-time problems never cross the polling boundary as errors; they
//! are folded into a `TaskFailure` stored on the record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-distinguishable failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// The tool exceeded its wall-clock budget and was killed.
    Timeout,

    /// The executable could not be started (missing binary, permissions, ...).
    SpawnFailure,

    /// The parser itself blew up on the captured output.
    ParseFailure,

    /// The payload did not match the shape the tool expects.
    Rejected,

    /// The task was cancelled by a caller.
    Cancelled,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::SpawnFailure => "spawn-failure",
            FailureKind::ParseFailure => "parse-failure",
            FailureKind::Rejected => "rejected",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reason stored on a `FAILED` task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn spawn_failure(message: impl Into<String>) -> Self {
        Self::new(FailureKind::SpawnFailure, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Rejected, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Cancelled, message)
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Which parsing path produced a result.
///
/// `Fallback` is a substring heuristic and is lower-confidence than `Grammar`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    Grammar,
    Fallback,
}
