use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub retry_after_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    window_reset_at: i64,
}

struct LimiterState {
    entries: HashMap<String, RateLimitEntry>,
    next_sweep_at: i64,
}

/// Fixed-window rate limiter keyed by caller identity.
///
/// Every check counts, including the ones that end up rejected; a rejected
/// burst never moves the window's reset point. Expired entries are pruned at
/// most once per window, on access.
pub struct RateLimiter {
    window_ms: u64,
    max_requests: u32,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window_ms: config.window_ms,
            max_requests: config.max_requests,
            state: Mutex::new(LimiterState {
                entries: HashMap::new(),
                next_sweep_at: 0,
            }),
        }
    }

    pub fn check(&self, identity: &str) -> RateDecision {
        self.check_at(identity, chrono::Utc::now().timestamp_millis())
    }

    /// Same as [`check`](Self::check) with an explicit clock in epoch millis.
    pub fn check_at(&self, identity: &str, now: i64) -> RateDecision {
        let window = self.window_ms as i64;
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if now >= state.next_sweep_at {
            Self::sweep_entries(&mut state.entries, now);
            state.next_sweep_at = now + window;
        }

        let entry = state
            .entries
            .entry(identity.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                window_reset_at: now + window,
            });

        if now >= entry.window_reset_at {
            entry.count = 1;
            entry.window_reset_at = now + window;
        } else {
            entry.count = entry.count.saturating_add(1);
        }

        if entry.count <= self.max_requests {
            RateDecision {
                allowed: true,
                retry_after_ms: 0,
            }
        } else {
            RateDecision {
                allowed: false,
                retry_after_ms: (entry.window_reset_at - now).max(0) as u64,
            }
        }
    }

    /// Drop entries whose window has already ended.
    pub fn sweep_at(&self, now: i64) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Self::sweep_entries(&mut state.entries, now);
    }

    fn sweep_entries(entries: &mut HashMap<String, RateLimitEntry>, now: i64) {
        let before = entries.len();
        entries.retain(|_, entry| now < entry.window_reset_at);
        let pruned = before - entries.len();
        if pruned > 0 {
            log::debug!("Pruned {} expired rate limit entries", pruned);
        }
    }

    pub fn tracked_identities(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.entries.len())
            .unwrap_or(0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}
