//! Task status state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle of a task.
///
/// State transitions:
/// - Pending -> Running -> Completed
/// - Pending -> Running -> Failed (timeout, spawn failure, rejected payload, cancel)
/// - Pending -> Failed (cancelled before admission)
///
/// Terminal states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Accepted, waiting for a free slot.
    Pending,

    /// Admitted into the running set; the tool is executing.
    Running,

    /// Tool finished and its output was parsed.
    Completed,

    /// Tool could not produce a result.
    Failed,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Position in the lifecycle, used to assert monotonic progress.
    pub fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Running => 1,
            TaskStatus::Completed | TaskStatus::Failed => 2,
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn serializes_as_screaming_snake_case() {
        let s = serde_json::to_string(&TaskStatus::Pending).unwrap();
        assert_eq!(s, "\"PENDING\"");
        let s = serde_json::to_string(&TaskStatus::Completed).unwrap();
        assert_eq!(s, "\"COMPLETED\"");
    }

    #[rstest]
    #[case::admit(TaskStatus::Pending, TaskStatus::Running, true)]
    #[case::cancel_pending(TaskStatus::Pending, TaskStatus::Failed, true)]
    #[case::complete(TaskStatus::Running, TaskStatus::Completed, true)]
    #[case::fail(TaskStatus::Running, TaskStatus::Failed, true)]
    #[case::skip_running(TaskStatus::Pending, TaskStatus::Completed, false)]
    #[case::back_to_pending(TaskStatus::Running, TaskStatus::Pending, false)]
    #[case::revive_completed(TaskStatus::Completed, TaskStatus::Running, false)]
    #[case::flip_terminal(TaskStatus::Failed, TaskStatus::Completed, false)]
    fn transitions(#[case] from: TaskStatus, #[case] to: TaskStatus, #[case] ok: bool) {
        assert_eq!(from.can_transition_to(to), ok);
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }
}
