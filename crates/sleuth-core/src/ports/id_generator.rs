//! IdGenerator port - TaskId の発行
//!
//! Ids double as the submission order, so a generator must hand out strictly
//! increasing ids even when many submissions land in the same millisecond.

use std::sync::Mutex;

use ulid::Ulid;

use crate::domain::TaskId;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

/// ULID generator: timestamp from the injected clock, random tail.
///
/// Within one millisecond (or if the clock steps backwards) the previous
/// ULID is incremented instead, so ids never go out of order.
pub struct UlidGenerator<C> {
    clock: C,
    last: Mutex<Option<Ulid>>,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            last: Mutex::new(None),
        }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        let fresh = Ulid::from_parts(timestamp_ms, rand::random());

        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = match *last {
            // increment() は random 部が溢れると None
            Some(prev) if prev.timestamp_ms() >= timestamp_ms => {
                prev.increment().unwrap_or(fresh)
            }
            _ => fresh,
        };
        *last = Some(next);
        TaskId::from(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, ManualClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn same_millisecond_ids_still_increase() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let ids = UlidGenerator::new(FixedClock::new(at));

        let generated: Vec<TaskId> = (0..100).map(|_| ids.generate_task_id()).collect();
        assert!(generated.windows(2).all(|w| w[0] < w[1]));
        assert!(
            generated
                .iter()
                .all(|id| id.as_ulid().timestamp_ms() == at.timestamp_millis() as u64)
        );
    }

    #[test]
    fn clock_moving_backwards_does_not_reorder() {
        let clock = std::sync::Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let ids = UlidGenerator::new(clock.clone());

        let first = ids.generate_task_id();
        clock.advance(chrono::Duration::seconds(-5));
        let second = ids.generate_task_id();
        assert!(first < second);

        clock.advance(chrono::Duration::seconds(10));
        let third = ids.generate_task_id();
        assert!(second < third);
    }
}
