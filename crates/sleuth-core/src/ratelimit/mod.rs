//! Rate Limiter: at most N submissions per (user, task type) per window.
//!
//! The check and the record happen under one lock, so two concurrent
//! submissions can never both pass on the last free slot.

mod window;

pub use window::WindowMode;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::TaskType;
use crate::ports::Clock;
use window::Window;

/// Idle windows are swept every this many checks.
const PURGE_EVERY: u64 = 256;

/// Limit applied to one task type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
    pub mode: WindowMode,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(60),
            mode: WindowMode::Sliding,
        }
    }
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window: Duration, mode: WindowMode) -> Self {
        Self {
            max_requests,
            window,
            mode,
        }
    }

    fn window_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.window).unwrap_or_else(|_| chrono::Duration::weeks(52))
    }
}

/// Submission refused by the limiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RateLimited {
    pub message: String,
    pub retry_after: Duration,
}

#[derive(Debug, Default)]
struct LimiterState {
    windows: HashMap<(String, TaskType), Window>,
    checks: u64,
}

pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    default_policy: RateLimitPolicy,
    overrides: HashMap<TaskType, RateLimitPolicy>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>, default_policy: RateLimitPolicy) -> Self {
        Self {
            clock,
            default_policy,
            overrides: HashMap::new(),
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Use a different policy for one task type.
    pub fn with_override(mut self, task_type: TaskType, policy: RateLimitPolicy) -> Self {
        self.overrides.insert(task_type, policy);
        self
    }

    pub fn policy_for(&self, task_type: &TaskType) -> &RateLimitPolicy {
        self.overrides.get(task_type).unwrap_or(&self.default_policy)
    }

    /// Count this submission if it fits in the window; otherwise refuse it.
    pub fn check_and_record(&self, user_id: &str, task_type: &TaskType) -> Result<(), RateLimited> {
        let policy = *self.policy_for(task_type);
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        state.checks += 1;
        if state.checks % PURGE_EVERY == 0 {
            self.purge_locked(&mut state, now);
        }

        let window = state
            .windows
            .entry((user_id.to_string(), task_type.clone()))
            .or_insert_with(|| Window::new(policy.mode, now));

        window.try_record(&policy, now).map_err(|free_at| {
            let retry_after = (free_at - now).to_std().unwrap_or(Duration::ZERO);
            debug!(user_id, %task_type, ?retry_after, "rate limited");
            RateLimited {
                message: format!(
                    "rate limit exceeded: at most {} {} requests per {}s; retry in {}s",
                    policy.max_requests,
                    task_type,
                    policy.window.as_secs(),
                    retry_after.as_secs().max(1),
                ),
                retry_after,
            }
        })
    }

    /// Drop windows with nothing left in them. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.purge_locked(&mut state, now)
    }

    /// Number of (user, type) windows currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .windows
            .len()
    }

    fn purge_locked(&self, state: &mut LimiterState, now: chrono::DateTime<chrono::Utc>) -> usize {
        let before = state.windows.len();
        state
            .windows
            .retain(|(_, task_type), window| !window.is_idle(self.policy_for(task_type), now));
        before - state.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ManualClock;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn email() -> TaskType {
        TaskType::new(TaskType::EMAIL_ENUMERATION)
    }

    fn setup(mode: WindowMode) -> (Arc<ManualClock>, RateLimiter) {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let limiter = RateLimiter::new(
            clock.clone(),
            RateLimitPolicy::new(5, Duration::from_secs(60), mode),
        );
        (clock, limiter)
    }

    #[rstest]
    #[case::sliding(WindowMode::Sliding)]
    #[case::fixed(WindowMode::Fixed)]
    fn sixth_request_in_window_is_refused(#[case] mode: WindowMode) {
        let (clock, limiter) = setup(mode);
        for _ in 0..5 {
            limiter.check_and_record("alice", &email()).unwrap();
            clock.advance(chrono::Duration::seconds(1));
        }

        let err = limiter.check_and_record("alice", &email()).unwrap_err();
        assert!(err.message.contains("rate limit exceeded"));
        assert!(err.retry_after > Duration::ZERO);
        assert!(err.retry_after <= Duration::from_secs(60));
    }

    #[rstest]
    #[case::sliding(WindowMode::Sliding)]
    #[case::fixed(WindowMode::Fixed)]
    fn window_expiry_allows_again(#[case] mode: WindowMode) {
        let (clock, limiter) = setup(mode);
        for _ in 0..5 {
            limiter.check_and_record("alice", &email()).unwrap();
        }
        assert!(limiter.check_and_record("alice", &email()).is_err());

        clock.advance(chrono::Duration::seconds(60));
        limiter.check_and_record("alice", &email()).unwrap();
    }

    #[test]
    fn sliding_window_frees_one_slot_at_a_time() {
        let (clock, limiter) = setup(WindowMode::Sliding);
        for _ in 0..5 {
            limiter.check_and_record("alice", &email()).unwrap();
            clock.advance(chrono::Duration::seconds(10));
        }
        // t=50: oldest hit (t=0) leaves the window at t=60
        let err = limiter.check_and_record("alice", &email()).unwrap_err();
        assert_eq!(err.retry_after, Duration::from_secs(10));

        clock.advance(chrono::Duration::seconds(10));
        limiter.check_and_record("alice", &email()).unwrap();
        assert!(limiter.check_and_record("alice", &email()).is_err());
    }

    #[test]
    fn refused_requests_are_not_counted() {
        let (clock, limiter) = setup(WindowMode::Sliding);
        for _ in 0..5 {
            limiter.check_and_record("alice", &email()).unwrap();
        }
        for _ in 0..10 {
            assert!(limiter.check_and_record("alice", &email()).is_err());
        }
        clock.advance(chrono::Duration::seconds(60));
        for _ in 0..5 {
            limiter.check_and_record("alice", &email()).unwrap();
        }
    }

    #[test]
    fn keys_are_independent() {
        let (_clock, limiter) = setup(WindowMode::Sliding);
        for _ in 0..5 {
            limiter.check_and_record("alice", &email()).unwrap();
        }
        assert!(limiter.check_and_record("alice", &email()).is_err());

        limiter.check_and_record("bob", &email()).unwrap();
        limiter
            .check_and_record("alice", &TaskType::new(TaskType::PHONE_ENUMERATION))
            .unwrap();
    }

    #[test]
    fn overrides_apply_per_type() {
        let (_clock, limiter) = setup(WindowMode::Sliding);
        let dir = TaskType::new(TaskType::DIRECTORY_ENUMERATION);
        let limiter = limiter.with_override(
            dir.clone(),
            RateLimitPolicy::new(1, Duration::from_secs(300), WindowMode::Fixed),
        );

        limiter.check_and_record("alice", &dir).unwrap();
        assert!(limiter.check_and_record("alice", &dir).is_err());
        limiter.check_and_record("alice", &email()).unwrap();
    }

    #[test]
    fn purge_drops_idle_windows_only() {
        let (clock, limiter) = setup(WindowMode::Sliding);
        limiter.check_and_record("alice", &email()).unwrap();
        clock.advance(chrono::Duration::seconds(30));
        limiter.check_and_record("bob", &email()).unwrap();
        assert_eq!(limiter.tracked_keys(), 2);

        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(limiter.purge_expired(), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn concurrent_checks_never_exceed_the_limit() {
        let (_clock, limiter) = setup(WindowMode::Sliding);
        let limiter = Arc::new(limiter);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.check_and_record("alice", &email()).is_ok())
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(accepted, 5);
    }
}
