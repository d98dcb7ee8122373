use serde::{Deserialize, Serialize};
use std::fmt;

use super::TaskId;

/// Tool identifier, e.g. `email-enumeration`.
///
/// Kept as a string newtype: the set of valid values is whatever the
/// `ToolRegistry` knows about, not a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(String);

impl TaskType {
    pub const EMAIL_ENUMERATION: &'static str = "email-enumeration";
    pub const PHONE_ENUMERATION: &'static str = "phone-enumeration";
    pub const DIRECTORY_ENUMERATION: &'static str = "directory-enumeration";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// TaskType + Payload (+ TaskId, userId) の“運搬用”データ。
///
/// This is what a worker receives when a task is admitted; it is a copy, so
/// the worker never holds the store lock while the tool runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    task_id: TaskId,
    task_type: TaskType,
    user_id: String,
    payload: serde_json::Value,
}

impl TaskEnvelope {
    pub fn new(
        task_id: TaskId,
        task_type: TaskType,
        user_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            task_id,
            task_type,
            user_id: user_id.into(),
            payload,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}
