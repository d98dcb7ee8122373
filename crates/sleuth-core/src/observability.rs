use serde::{Deserialize, Serialize};

/// Task counts by status, taken under one lock so they are consistent.
///
/// `pending + running + completed + failed + evicted` equals the number of
/// tasks ever accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    /// Terminal records dropped by retention.
    pub evicted: usize,
}

impl QueueStats {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed + self.evicted
    }
}
