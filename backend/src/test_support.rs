//! Test utilities for the backend crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Compiled for tests and behind the `test-support` feature.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;

/// Fixed instant used as the default "now" in commit tests.
pub fn fixture_timestamp() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 2, 24, 10, 30, 0).single() {
        Some(at) => at,
        None => panic!("valid fixture timestamp"),
    }
}

/// Settable clock that records how often it was read.
///
/// # Examples
/// ```
/// use mockable::Clock;
/// use service_backend::test_support::{MutableClock, fixture_timestamp};
///
/// let clock = MutableClock::new(fixture_timestamp());
/// clock.advance_seconds(5);
/// assert_eq!((clock.utc() - fixture_timestamp()).num_seconds(), 5);
/// assert_eq!(clock.reads(), 1);
/// ```
#[derive(Debug)]
pub struct MutableClock {
    now: Mutex<DateTime<Utc>>,
    reads: AtomicUsize,
}

impl MutableClock {
    /// Clock reporting `now` until advanced.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            reads: AtomicUsize::new(0),
        }
    }

    /// Move the reported instant forward by `seconds`.
    pub fn advance_seconds(&self, seconds: i64) {
        *self.lock_clock() += TimeDelta::seconds(seconds);
    }

    /// Number of `utc()`/`local()` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn lock_clock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        match self.now.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        *self.lock_clock()
    }
}
