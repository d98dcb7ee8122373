//! Per-key submission windows.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RateLimitPolicy;

/// How the window is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Counter reset every `window`, measured from the first request.
    Fixed,

    /// Exact count of requests in the trailing `window`.
    #[default]
    Sliding,
}

#[derive(Debug)]
pub(crate) enum Window {
    Fixed {
        started_at: DateTime<Utc>,
        count: u32,
    },
    Sliding(VecDeque<DateTime<Utc>>),
}

impl Window {
    pub(crate) fn new(mode: WindowMode, now: DateTime<Utc>) -> Self {
        match mode {
            WindowMode::Fixed => Window::Fixed {
                started_at: now,
                count: 0,
            },
            WindowMode::Sliding => Window::Sliding(VecDeque::new()),
        }
    }

    /// Record one request, or return when the next one will be allowed.
    pub(crate) fn try_record(
        &mut self,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Result<(), DateTime<Utc>> {
        let window = policy.window_delta();
        match self {
            Window::Fixed { started_at, count } => {
                if now - *started_at >= window {
                    *started_at = now;
                    *count = 0;
                }
                if *count >= policy.max_requests {
                    return Err(*started_at + window);
                }
                *count += 1;
                Ok(())
            }
            Window::Sliding(hits) => {
                while hits.front().is_some_and(|t| now - *t >= window) {
                    hits.pop_front();
                }
                if hits.len() >= policy.max_requests as usize {
                    // front は必ず存在する (max_requests > 0)
                    let oldest = hits.front().copied().unwrap_or(now);
                    return Err(oldest + window);
                }
                hits.push_back(now);
                Ok(())
            }
        }
    }

    /// No request inside the window any more.
    pub(crate) fn is_idle(&self, policy: &RateLimitPolicy, now: DateTime<Utc>) -> bool {
        let window = policy.window_delta();
        match self {
            Window::Fixed { started_at, .. } => now - *started_at >= window,
            Window::Sliding(hits) => hits.back().is_none_or(|t| now - *t >= window),
        }
    }
}
