//! Rate limiting logic and state management.

mod clock;
mod limiter;
mod sweeper;
mod window;

pub use clock::{Clock, SystemClock};
#[cfg(test)]
pub use clock::MockClock;
pub use limiter::FixedWindowLimiter;
pub use sweeper::spawn_sweeper;
pub use window::{Decision, LimitConfig, WindowEntry, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};
