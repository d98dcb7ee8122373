//! Domain model (IDs, task types, status, findings, outcomes).

pub mod finding;
pub mod ids;
pub mod outcome;
pub mod state;
pub mod task;

pub use finding::Finding;
pub use ids::{ParseIdError, TaskId};
pub use outcome::{FailureKind, ParseStrategy, TaskFailure};
pub use state::TaskStatus;
pub use task::{TaskEnvelope, TaskType};
