//! Sliding-window rate limiter for connection attempts.
//!
//! Prevents flapping between networks while the screen is off. Entries
//! expire by age, never by count.

use std::collections::VecDeque;

/// Maximum attempts allowed inside the window.
pub const MAX_CONNECTION_ATTEMPTS_RATE: usize = 6;
/// Width of the sliding window.
pub const MAX_CONNECTION_ATTEMPTS_WINDOW_MS: i64 = 4 * 60 * 1000;

/// Time-ordered log of connection attempt timestamps (monotonic millis).
#[derive(Debug, Default)]
pub struct ConnectionAttemptLog {
    timestamps: VecDeque<i64>,
}

impl ConnectionAttemptLog {
    pub fn new() -> Self {
        ConnectionAttemptLog::default()
    }

    /// Evict entries older than the window, then report whether the attempt
    /// rate has been reached. Does not log the attempt itself.
    pub fn should_skip(&mut self, now_millis: i64) -> bool {
        while let Some(&oldest) = self.timestamps.front() {
            if now_millis - oldest > MAX_CONNECTION_ATTEMPTS_WINDOW_MS {
                self.timestamps.pop_front();
            } else {
                // The queue is sorted by time, no need to look further.
                break;
            }
        }
        self.timestamps.len() >= MAX_CONNECTION_ATTEMPTS_RATE
    }

    pub fn note(&mut self, now_millis: i64) {
        self.timestamps.push_back(now_millis);
    }

    /// Called when the user explicitly connects, so their action is never
    /// rate limited by automatic attempts.
    pub fn clear(&mut self) {
        self.timestamps.clear();
    }
}
