//! Wall-clock and monotonic time sources
//!
//! Both sources are swappable so tests can pin event timestamps.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// Point in time as epoch seconds plus nanoseconds within the second
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventInstant {
    epoch_second: i64,
    nano_of_second: u32,
}

impl EventInstant {
    pub const EPOCH: EventInstant = EventInstant {
        epoch_second: 0,
        nano_of_second: 0,
    };

    /// Build an instant; `nano_of_second` values past one second carry over
    pub fn new(epoch_second: i64, nano_of_second: u32) -> Self {
        Self {
            epoch_second: epoch_second + i64::from(nano_of_second / 1_000_000_000),
            nano_of_second: nano_of_second % 1_000_000_000,
        }
    }

    pub fn from_epoch_millis(millis: i64) -> Self {
        let seconds = millis.div_euclid(1000);
        let nanos = (millis.rem_euclid(1000) * 1_000_000) as u32;
        Self::new(seconds, nanos)
    }

    pub fn from_datetime(datetime: &DateTime<Utc>) -> Self {
        Self::new(datetime.timestamp(), datetime.timestamp_subsec_nanos())
    }

    pub fn epoch_second(&self) -> i64 {
        self.epoch_second
    }

    pub fn nano_of_second(&self) -> u32 {
        self.nano_of_second
    }

    pub fn epoch_millis(&self) -> i64 {
        self.epoch_second * 1000 + i64::from(self.nano_of_second / 1_000_000)
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.epoch_second, self.nano_of_second)
            .single()
            .unwrap_or_default()
    }
}

impl fmt::Display for EventInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.epoch_second, self.nano_of_second)
    }
}

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> EventInstant;
}

/// Source of a monotonic nanosecond counter, for intra-process ordering
pub trait NanoClock: Send + Sync {
    fn nano_time(&self) -> i64;
}

/// Wall clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> EventInstant {
        EventInstant::from_datetime(&Utc::now())
    }
}

/// Monotonic clock measuring nanoseconds since the first reading in this process
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNanoClock;

impl NanoClock for SystemNanoClock {
    fn nano_time(&self) -> i64 {
        static ANCHOR: OnceLock<Instant> = OnceLock::new();
        let anchor = ANCHOR.get_or_init(Instant::now);
        anchor.elapsed().as_nanos() as i64
    }
}

/// Nano clock that always returns the same value.
///
/// This is the default: reading a real monotonic clock per event is only
/// worth paying for when a sink actually renders the nano time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyNanoClock {
    fixed: i64,
}

impl DummyNanoClock {
    pub fn new(fixed: i64) -> Self {
        Self { fixed }
    }
}

impl NanoClock for DummyNanoClock {
    fn nano_time(&self) -> i64 {
        self.fixed
    }
}

/// Clock for tests: returns a settable instant, optionally advancing per read
#[derive(Debug, Default)]
pub struct FixedClock {
    millis: AtomicI64,
    step_millis: i64,
}

impl FixedClock {
    pub fn new(epoch_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(epoch_millis),
            step_millis: 0,
        }
    }

    /// Advance by `step_millis` after every reading
    pub fn ticking(epoch_millis: i64, step_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(epoch_millis),
            step_millis,
        }
    }

    pub fn set(&self, epoch_millis: i64) {
        self.millis.store(epoch_millis, Ordering::Relaxed);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> EventInstant {
        let millis = self.millis.fetch_add(self.step_millis, Ordering::Relaxed);
        EventInstant::from_epoch_millis(millis)
    }
}
