//! Injectable time source.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of current Unix time, injectable so timers and timestamps are
/// testable without sleeping.
pub trait Clock: Send + Sync {
    /// Current Unix time in whole seconds.
    fn now_unix(&self) -> i64;

    /// Current Unix time in milliseconds, used for backup and snapshot
    /// timestamps.
    fn now_unix_millis(&self) -> i64 {
        self.now_unix() * 1000
    }
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        Utc::now().timestamp()
    }

    fn now_unix_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_unix: i64) -> Self {
        Self {
            now: AtomicI64::new(now_unix),
        }
    }

    pub fn set(&self, now_unix: i64) {
        self.now.store(now_unix, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now_unix(), 100);
        assert_eq!(clock.now_unix_millis(), 100_000);

        clock.advance(30);
        assert_eq!(clock.now_unix(), 130);

        clock.set(59);
        assert_eq!(clock.now_unix(), 59);
    }
}
