//! Time sources.
//!
//! Everything in the core reads time through this trait so tests can drive
//! the clock by hand.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Monotonic and wall-clock time in milliseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary fixed point; never goes backwards.
    fn elapsed_millis(&self) -> i64;
    /// Milliseconds since the Unix epoch.
    fn wall_clock_millis(&self) -> i64;
}

/// System-backed clock used by the daemon.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Arc<Self> {
        Arc::new(SystemClock {
            origin: Instant::now(),
        })
    }
}

impl Clock for SystemClock {
    fn elapsed_millis(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }

    fn wall_clock_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}
