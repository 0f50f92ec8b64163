//! Sliding-window admission control, one window per provider key.
//!
//! The registry is an explicit object constructed once per process and
//! passed by reference to the coordinator; there is no global limiter
//! state. A key without configuration is unrestricted.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Window configuration for one provider key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sliding window length.
    pub window: Duration,
    /// Requests admitted per window.
    pub max_requests: u32,
    /// Optional fixed spacing between consecutive requests, applied after
    /// window admission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_delay: Option<Duration>,
}

impl RateLimitConfig {
    pub const fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            min_delay: None,
        }
    }

    pub const fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = Some(min_delay);
        self
    }
}

#[derive(Debug)]
struct KeyState {
    config: RateLimitConfig,
    history: VecDeque<Instant>,
    last_request: Option<Instant>,
}

impl KeyState {
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.history.front() {
            if now.duration_since(*oldest) >= self.config.window {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time until the window admits another request; zero when it already
    /// does.
    fn window_wait(&self, now: Instant) -> Duration {
        if (self.history.len() as u32) < self.config.max_requests {
            return Duration::ZERO;
        }
        match self.history.front() {
            Some(oldest) => (*oldest + self.config.window).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    fn delay_wait(&self, now: Instant) -> Duration {
        match (self.config.min_delay, self.last_request) {
            (Some(delay), Some(last)) => (last + delay).saturating_duration_since(now),
            _ => Duration::ZERO,
        }
    }

    fn record(&mut self, now: Instant) {
        self.history.push_back(now);
        self.last_request = Some(now);
    }
}

/// Per-key sliding-window rate limiters. Never errors; admission for an
/// unregistered key is immediate.
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    keys: Mutex<HashMap<String, KeyState>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, key: impl Into<String>, config: RateLimitConfig) {
        let mut keys = self.keys.lock().expect("rate limiter lock is not poisoned");
        keys.insert(
            key.into(),
            KeyState {
                config,
                history: VecDeque::new(),
                last_request: None,
            },
        );
    }

    /// Non-blocking admission check. Does not consume a slot.
    pub fn is_allowed(&self, key: &str) -> bool {
        let mut keys = self.keys.lock().expect("rate limiter lock is not poisoned");
        let Some(state) = keys.get_mut(key) else {
            return true;
        };
        let now = Instant::now();
        state.prune(now);
        state.window_wait(now).is_zero() && state.delay_wait(now).is_zero()
    }

    /// Suspend until the window admits a request, then apply the fixed
    /// inter-request delay, then consume the slot.
    pub async fn wait_for_slot(&self, key: &str) {
        loop {
            let wait = {
                let mut keys = self.keys.lock().expect("rate limiter lock is not poisoned");
                let Some(state) = keys.get_mut(key) else {
                    return;
                };
                let now = Instant::now();
                state.prune(now);
                let wait = state.window_wait(now).max(state.delay_wait(now));
                if wait.is_zero() {
                    state.record(now);
                    return;
                }
                wait
            };
            tracing::trace!(key, wait_ms = wait.as_millis() as u64, "rate limit wait");
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests left in the current window; `None` for unrestricted keys.
    pub fn remaining(&self, key: &str) -> Option<u32> {
        let mut keys = self.keys.lock().expect("rate limiter lock is not poisoned");
        let state = keys.get_mut(key)?;
        state.prune(Instant::now());
        Some(state.config.max_requests.saturating_sub(state.history.len() as u32))
    }

    /// Time until the oldest in-window request falls out of the window.
    /// Zero when the window is not saturated or the key is unrestricted.
    pub fn time_to_reset(&self, key: &str) -> Duration {
        let mut keys = self.keys.lock().expect("rate limiter lock is not poisoned");
        let Some(state) = keys.get_mut(key) else {
            return Duration::ZERO;
        };
        let now = Instant::now();
        state.prune(now);
        state.window_wait(now)
    }
}
