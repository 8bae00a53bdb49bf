//! Wall-clock abstraction.
//!
//! Expiry arithmetic and tamper detection both read the wall clock, so the
//! manager takes a [`Clock`] instead of calling `Utc::now()` directly. Tests
//! use [`ManualClock`] to move time forwards and backwards.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Milliseconds in one day.
pub const DAY_MS: i64 = 86_400_000;

/// Source of wall-clock time.
pub trait Clock: Send + Sync + 'static {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;

    /// Current time as epoch milliseconds.
    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }

    /// Moves the clock by `by`; negative durations roll it back.
    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.millis.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
    }

    fn now_ms(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

/// Whole days from `now_ms` until `target_ms`, rounded up.
///
/// Negative when the target is in the past: one and a half days ago is `-1`.
pub fn days_until(target_ms: i64, now_ms: i64) -> i64 {
    let delta = target_ms - now_ms;
    let days = delta / DAY_MS;
    if delta % DAY_MS > 0 {
        days + 1
    } else {
        days
    }
}
