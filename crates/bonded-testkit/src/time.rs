//! Controllable clock

use bonded_core::Timestamp;
use bonded_roles::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Clock reading `start`
    pub fn new(start: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start),
        }
    }

    /// Jump to `now`
    pub fn set(&self, now: u64) {
        self.now_ms.store(now, Ordering::SeqCst);
    }

    /// Move forward
    pub fn advance(&self, by: Duration) -> Timestamp {
        let ms = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        Timestamp(self.now_ms.fetch_add(ms, Ordering::SeqCst).saturating_add(ms))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now_ms.load(Ordering::SeqCst))
    }
}
