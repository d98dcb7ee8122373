//! Queue module: task records, the in-memory store, retention.

mod record;
mod retention;
mod store;

pub use record::{TaskRecord, TaskSnapshot, TransitionError};
pub use retention::RetentionPolicy;
pub use store::{Admitted, CancelOutcome, StoreError, TaskStore};
