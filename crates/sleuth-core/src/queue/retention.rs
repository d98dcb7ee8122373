//! How long finished records stay pollable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retention for terminal records. Pending and running records are never
/// evicted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Evict terminal records whose `completed_at` is older than this.
    pub ttl: Option<Duration>,
    /// Keep at most this many terminal records; the oldest go first.
    pub max_terminal: Option<usize>,
}

impl RetentionPolicy {
    pub fn keep_forever() -> Self {
        Self::default()
    }

    pub fn is_keep_forever(&self) -> bool {
        self.ttl.is_none() && self.max_terminal.is_none()
    }
}
