//! Fixed-window state and decisions.

use serde::{Serialize, Serializer};
use std::time::{Duration, Instant};

/// Default length of a rate limit window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
/// Default number of requests allowed per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 5;

/// Window length and request budget for a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitConfig {
    /// Length of each window
    pub window: Duration,
    /// Maximum requests allowed per key in one window
    pub max_requests: u32,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

/// Rate limit state for a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEntry {
    /// Requests observed in the current window
    pub count: u32,
    /// When the current window began
    pub window_start: Instant,
}

impl WindowEntry {
    /// Start a fresh window at `now` holding one request.
    pub fn start(now: Instant) -> Self {
        Self {
            count: 1,
            window_start: now,
        }
    }

    /// Whether the window has strictly elapsed at `now`.
    pub fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) > window
    }

    /// Whole seconds until this window rolls over, never less than one.
    pub fn retry_after_seconds(&self, now: Instant, window: Duration) -> u64 {
        let elapsed = now.saturating_duration_since(self.window_start);
        let remaining_ms = window.saturating_sub(elapsed).as_millis();
        let secs = remaining_ms.div_ceil(1000).max(1);
        u64::try_from(secs).unwrap_or(u64::MAX)
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed
    Allowed,
    /// The key has used its budget for the current window
    Denied {
        /// Seconds until the window rolls over (at least 1)
        retry_after_seconds: u64,
    },
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    /// Retry hint for denied requests.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Decision::Allowed => None,
            Decision::Denied {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
        }
    }
}

/// Serialized as `{"allowed": true}` or
/// `{"allowed": false, "retryAfterSeconds": n}`.
impl Serialize for Decision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body {
            allowed: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            retry_after_seconds: Option<u64>,
        }

        Body {
            allowed: self.is_allowed(),
            retry_after_seconds: self.retry_after_seconds(),
        }
        .serialize(serializer)
    }
}
