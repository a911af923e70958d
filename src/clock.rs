use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::warn;

/// Source of reading timestamps, in seconds.
pub trait Clock {
    fn now_secs(&self) -> i64;
}

/// Wall clock; seconds since start if the clock is before the epoch.
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    fn secs_at(&self, now: SystemTime) -> i64 {
        match now.duration_since(UNIX_EPOCH) {
            Ok(since_epoch) => since_epoch.as_secs() as i64,
            Err(e) => {
                warn!("System clock before epoch ({}); using uptime", e);
                self.started.elapsed().as_secs() as i64
            }
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        self.secs_at(SystemTime::now())
    }
}
