//! Request budget shared by every worker that talks to the API.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

pub const DEFAULT_REQUESTS_PER_HOUR: u32 = 1000;
const HOUR: Duration = Duration::from_secs(3600);

/// Caps requests per rolling window. The window opens with the first request
/// and resets once it has fully elapsed; callers over budget wait for the
/// reset instead of going over.
#[derive(Debug)]
pub struct RateLimiter {
    ceiling: u32,
    window: Duration,
    state: Mutex<Window>,
}

#[derive(Debug, Default)]
struct Window {
    started: Option<Instant>,
    used: u32,
    paused_until: Option<Instant>,
}

impl RateLimiter {
    /// Limiter allowing `requests_per_hour` requests per hour (at least one).
    pub fn per_hour(requests_per_hour: u32) -> Self {
        Self::new(requests_per_hour, HOUR)
    }

    pub fn new(ceiling: u32, window: Duration) -> Self {
        Self {
            ceiling: ceiling.max(1),
            window,
            state: Mutex::new(Window::default()),
        }
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Wait until a request may be sent, then take it out of the budget.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire_at(Instant::now()) {
                Ok(()) => return,
                Err(wait) => {
                    debug!(wait_ms = wait.as_millis() as u64, "request budget exhausted, waiting");
                    sleep(wait).await;
                }
            }
        }
    }

    /// Requests left in the current window.
    pub fn remaining(&self) -> u32 {
        let now = Instant::now();
        let state = self.state.lock();
        match state.started {
            Some(started) if now.duration_since(started) < self.window => {
                self.ceiling.saturating_sub(state.used)
            }
            _ => self.ceiling,
        }
    }

    /// Hold every caller back for `duration`, e.g. after the server answered
    /// with a throttling response.
    pub fn pause_for(&self, duration: Duration) {
        let until = Instant::now() + duration;
        let mut state = self.state.lock();
        if state.paused_until.map_or(true, |current| current < until) {
            warn!(pause_secs = duration.as_secs(), "pausing all API requests");
            state.paused_until = Some(until);
        }
    }

    fn try_acquire_at(&self, now: Instant) -> Result<(), Duration> {
        let mut state = self.state.lock();

        if let Some(until) = state.paused_until {
            if now < until {
                return Err(until - now);
            }
            state.paused_until = None;
        }

        let started = match state.started {
            Some(started) if now.duration_since(started) < self.window => started,
            _ => {
                state.started = Some(now);
                state.used = 0;
                now
            }
        };

        if state.used < self.ceiling {
            state.used += 1;
            Ok(())
        } else {
            Err(started + self.window - now)
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::per_hour(DEFAULT_REQUESTS_PER_HOUR)
    }
}
