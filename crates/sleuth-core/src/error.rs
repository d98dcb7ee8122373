//! Errors returned synchronously to callers of the scheduler.
//!
//! Execution problems (timeouts, spawn failures, ...) are not here: they end
//! up on the task record as a `TaskFailure`.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::{TaskId, TaskStatus, TaskType};
use crate::exec::ExecError;
use crate::queue::TaskSnapshot;
use crate::ratelimit::RateLimited;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("unknown task type '{0}'")]
    UnknownType(TaskType),

    #[error("invalid payload for '{task_type}': {message}")]
    InvalidPayload { task_type: TaskType, message: String },

    #[error(transparent)]
    RateLimited(#[from] RateLimited),
}

impl SubmitError {
    /// How long to wait before retrying, if that would help.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SubmitError::RateLimited(limited) => Some(limited.retry_after),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("task {0} not found")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum CancelError {
    #[error("task {0} not found")]
    NotFound(String),

    #[error("task {id} already finished ({status:?})")]
    AlreadyFinished { id: TaskId, status: TaskStatus },
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("task {0} not found")]
    NotFound(String),

    #[error("task {} still {:?} after {waited:?}", last.id, last.status)]
    DeadlineElapsed {
        waited: Duration,
        last: Box<TaskSnapshot>,
    },
}

impl From<StatusError> for WaitError {
    fn from(e: StatusError) -> Self {
        match e {
            StatusError::NotFound(id) => WaitError::NotFound(id),
        }
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("missing tool types: {0:?}. These tools were expected but not registered.")]
    MissingToolTypes(Vec<String>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not set up executors: {0}")]
    Executor(#[from] ExecError),
}
