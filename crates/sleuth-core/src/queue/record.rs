//! Task record: envelope + lifecycle state + outcome.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{
    Finding, ParseStrategy, TaskEnvelope, TaskFailure, TaskId, TaskStatus, TaskType,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Single source of truth for one task.
///
/// Fields are private: the only way to move a record forward is through the
/// transition methods, which keep `result` / `error` mutually exclusive.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    envelope: TaskEnvelope,
    status: TaskStatus,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<Vec<Finding>>,
    parse_strategy: Option<ParseStrategy>,
    error: Option<TaskFailure>,
}

impl TaskRecord {
    pub fn new(envelope: TaskEnvelope, created_at: DateTime<Utc>) -> Self {
        Self {
            envelope,
            status: TaskStatus::Pending,
            created_at,
            started_at: None,
            completed_at: None,
            result: None,
            parse_strategy: None,
            error: None,
        }
    }

    pub fn envelope(&self) -> &TaskEnvelope {
        &self.envelope
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Pending -> Running.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Running)?;
        self.started_at = Some(now.max(self.created_at));
        Ok(())
    }

    /// Running -> Completed.
    pub fn complete(
        &mut self,
        findings: Vec<Finding>,
        strategy: ParseStrategy,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Completed)?;
        self.completed_at = Some(self.clamp_end(now));
        self.result = Some(findings);
        self.parse_strategy = Some(strategy);
        Ok(())
    }

    /// Pending | Running -> Failed.
    pub fn fail(&mut self, failure: TaskFailure, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Failed)?;
        self.completed_at = Some(self.clamp_end(now));
        self.error = Some(failure);
        Ok(())
    }

    // completed_at は started_at より前にならない
    fn clamp_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(self.started_at.unwrap_or(self.created_at))
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.envelope.task_id(),
            task_type: self.envelope.task_type().clone(),
            user_id: self.envelope.user_id().to_string(),
            payload: self.envelope.payload().clone(),
            status: self.status,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            result: self.result.clone(),
            parse_strategy: self.parse_strategy,
            error: self.error.clone(),
        }
    }
}

/// What a poller sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub task_type: TaskType,
    pub user_id: String,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<Finding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_strategy: Option<ParseStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,
}
