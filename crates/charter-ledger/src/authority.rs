use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of `authority_timestamp` values.
///
/// Timestamps are informational; ordering is decided by sequence alone, so an
/// authority whose clock runs backwards cannot reorder the ledger.
pub trait TimeAuthority: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of the local host.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeAuthority;

impl TimeAuthority for SystemTimeAuthority {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests and replays.
///
/// Returns `start`, then `start + step`, `start + 2*step`, and so on. A zero
/// step freezes time.
#[derive(Debug)]
pub struct FixedTimeAuthority {
    next: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl FixedTimeAuthority {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::stepping(start, Duration::zero())
    }

    pub fn stepping(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }
}

impl TimeAuthority for FixedTimeAuthority {
    fn now(&self) -> DateTime<Utc> {
        // A poisoned clock still holds a valid instant.
        let mut next = self.next.lock().unwrap_or_else(|p| p.into_inner());
        let current = *next;
        *next = current + self.step;
        current
    }
}
