//! Fixed-window counter.

use std::time::Duration;
use tokio::time::Instant;
use warden_common_config::WindowSettings;

/// Requests allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl WindowLimit {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

impl From<WindowSettings> for WindowLimit {
    fn from(settings: WindowSettings) -> Self {
        Self::new(settings.max_requests, settings.window())
    }
}

/// Outcome of one counted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Time until the window resets. Only set when denied.
    pub remaining: Option<Duration>,
}

impl RateLimitDecision {
    pub(crate) fn allow() -> Self {
        Self {
            allowed: true,
            remaining: None,
        }
    }

    pub(crate) fn deny(remaining: Duration) -> Self {
        Self {
            allowed: false,
            remaining: Some(remaining),
        }
    }
}

/// Counter state for one key.
#[derive(Debug, Clone)]
pub struct FixedWindow {
    window_start: Instant,
    window: Duration,
    count: u32,
}

impl FixedWindow {
    /// Open a window at `now` holding the first request.
    pub fn open(now: Instant, limit: &WindowLimit) -> Self {
        Self {
            window_start: now,
            window: limit.window,
            count: 1,
        }
    }

    /// Count one request at `now`.
    ///
    /// Denied requests are counted too, so repeated calls against an
    /// exhausted window keep reporting the same outcome.
    pub fn record(&mut self, now: Instant, limit: &WindowLimit) -> RateLimitDecision {
        if self.is_expired(now) {
            *self = Self::open(now, limit);
            return RateLimitDecision::allow();
        }

        self.count = self.count.saturating_add(1);
        if self.count > limit.max_requests {
            RateLimitDecision::deny(self.remaining(now))
        } else {
            RateLimitDecision::allow()
        }
    }

    /// Time left in the window at `now`.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.window_start.checked_add(self.window) {
            Some(reset_at) => reset_at.saturating_duration_since(now),
            None => self
                .window
                .saturating_sub(now.saturating_duration_since(self.window_start)),
        }
    }

    /// Whether the window has elapsed at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= self.window
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }
}
