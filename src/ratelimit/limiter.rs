//! Core fixed-window rate limiter.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::window::{Decision, LimitConfig, WindowEntry};

/// Per-key fixed-window rate limiter.
///
/// Each key gets `max_requests` requests per window. A window opens on the
/// first request for a key and rolls over on the first request made after it
/// has elapsed. Requests at a window boundary can therefore burst to nearly
/// twice the nominal rate.
///
/// State lives in process memory only. `check` never evicts; entries are
/// overwritten on rollover and removed only by [`purge_expired`] or
/// [`clear`].
///
/// [`purge_expired`]: FixedWindowLimiter::purge_expired
/// [`clear`]: FixedWindowLimiter::clear
pub struct FixedWindowLimiter<C: Clock = SystemClock> {
    /// Window state indexed by key
    entries: DashMap<String, WindowEntry>,
    config: LimitConfig,
    clock: C,
}

impl FixedWindowLimiter<SystemClock> {
    /// Create a limiter with the default window and budget.
    pub fn new() -> Self {
        Self::with_config(LimitConfig::default())
    }

    /// Create a limiter with a custom window and budget.
    pub fn with_config(config: LimitConfig) -> Self {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<C: Clock> FixedWindowLimiter<C> {
    /// Create a limiter reading time from `clock`.
    pub fn with_clock(config: LimitConfig, clock: C) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            clock,
        }
    }

    /// Record a request for `key` and decide whether it may proceed.
    ///
    /// The read-modify-write happens under the map's entry guard, so
    /// concurrent checks for the same key are serialized.
    pub fn check(&self, key: &str) -> Decision {
        let now = self.clock.now();
        let LimitConfig {
            window,
            max_requests,
        } = self.config;

        let decision = match self.entries.entry(key.to_owned()) {
            Entry::Vacant(vacant) => {
                debug!(key = %key, "Opening rate limit window for new key");
                vacant.insert(WindowEntry::start(now));
                Decision::Allowed
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired(now, window) {
                    *entry = WindowEntry::start(now);
                    Decision::Allowed
                } else if entry.count >= max_requests {
                    Decision::Denied {
                        retry_after_seconds: entry.retry_after_seconds(now, window),
                    }
                } else {
                    entry.count += 1;
                    Decision::Allowed
                }
            }
        };

        trace!(key = %key, decision = ?decision, "Checked rate limit");
        decision
    }

    /// Current count for `key`, if it is tracked.
    pub fn count_for(&self, key: &str) -> Option<u32> {
        self.entries.get(key).map(|entry| entry.count)
    }

    /// Remove entries whose window has elapsed.
    ///
    /// An expired entry and a missing one lead to the same decision, so
    /// purging never changes the outcome of a later `check`.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let window = self.config.window;
        let before = self.entries.len();

        self.entries.retain(|_, entry| !entry.is_expired(now, window));

        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Purged expired rate limit entries");
        }
        removed
    }

    /// Drop all tracked keys.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The window and budget this limiter enforces.
    pub fn config(&self) -> LimitConfig {
        self.config
    }
}

impl Default for FixedWindowLimiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}
