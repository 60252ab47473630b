//! How the consumer waits for the next published event

use crossbeam_utils::Backoff;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Default wait of the `Timeout` strategy
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10;

/// Consumer wait strategy
///
/// `Block` and `Timeout` park the consumer on a condition variable and make
/// every publish signal it. `Sleep`, `Yield` and `BusySpin` never lock on the
/// producer side and trade consumer CPU for latency, in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitStrategy {
    /// Park until signalled
    Block,
    /// Park until signalled or the timeout elapses, then re-check
    Timeout { timeout_ms: u64 },
    /// Spin, then yield, then sleep briefly
    Sleep,
    /// Spin, then yield
    Yield,
    /// Spin only
    BusySpin,
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Timeout {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
        }
    }
}

impl WaitStrategy {
    /// True if producers must signal the consumer after each publish
    #[inline]
    pub fn is_blocking(&self) -> bool {
        matches!(self, WaitStrategy::Block | WaitStrategy::Timeout { .. })
    }
}

impl fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitStrategy::Block => write!(f, "Block"),
            WaitStrategy::Timeout { timeout_ms } => write!(f, "Timeout({}ms)", timeout_ms),
            WaitStrategy::Sleep => write!(f, "Sleep"),
            WaitStrategy::Yield => write!(f, "Yield"),
            WaitStrategy::BusySpin => write!(f, "BusySpin"),
        }
    }
}

impl FromStr for WaitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(WaitStrategy::Block),
            "timeout" => Ok(WaitStrategy::default()),
            "sleep" => Ok(WaitStrategy::Sleep),
            "yield" => Ok(WaitStrategy::Yield),
            "busyspin" | "busy_spin" => Ok(WaitStrategy::BusySpin),
            other => Err(format!("unknown wait strategy '{}'", other)),
        }
    }
}

/// Why a wait returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    Ready,
    Alerted,
    TimedOut,
}

/// Runtime side of a [`WaitStrategy`], shared by producers and the consumer
pub(crate) struct Waiter {
    strategy: WaitStrategy,
    lock: Mutex<()>,
    signal: Condvar,
}

impl Waiter {
    pub fn new(strategy: WaitStrategy) -> Self {
        Self {
            strategy,
            lock: Mutex::new(()),
            signal: Condvar::new(),
        }
    }

    pub fn strategy(&self) -> WaitStrategy {
        self.strategy
    }

    /// Wake a parked consumer. Cheap no-op for the spinning strategies.
    pub fn signal_all_when_blocking(&self) {
        if self.strategy.is_blocking() {
            let _guard = self.lock.lock();
            self.signal.notify_all();
        }
    }

    /// Wait until `ready` or `alerted` returns true, or `deadline` passes
    pub fn wait_until(
        &self,
        ready: impl Fn() -> bool,
        alerted: impl Fn() -> bool,
        deadline: Option<Instant>,
    ) -> WaitOutcome {
        match self.strategy {
            WaitStrategy::Block => self.park(&ready, &alerted, deadline, None),
            WaitStrategy::Timeout { timeout_ms } => self.park(
                &ready,
                &alerted,
                deadline,
                Some(Duration::from_millis(timeout_ms.max(1))),
            ),
            WaitStrategy::Sleep | WaitStrategy::Yield | WaitStrategy::BusySpin => {
                self.spin(&ready, &alerted, deadline)
            }
        }
    }

    fn park(
        &self,
        ready: &impl Fn() -> bool,
        alerted: &impl Fn() -> bool,
        deadline: Option<Instant>,
        slice: Option<Duration>,
    ) -> WaitOutcome {
        let mut guard = self.lock.lock();
        loop {
            // Checked under the lock: a publish cannot signal between the
            // check and the wait
            if ready() {
                return WaitOutcome::Ready;
            }
            if alerted() {
                return WaitOutcome::Alerted;
            }
            let now = Instant::now();
            let until = match (deadline, slice) {
                (Some(d), Some(s)) => Some(d.min(now + s)),
                (Some(d), None) => Some(d),
                (None, Some(s)) => Some(now + s),
                (None, None) => None,
            };
            match until {
                Some(until) => {
                    if deadline.is_some_and(|d| now >= d) {
                        return WaitOutcome::TimedOut;
                    }
                    self.signal.wait_until(&mut guard, until);
                }
                None => self.signal.wait(&mut guard),
            }
        }
    }

    fn spin(
        &self,
        ready: &impl Fn() -> bool,
        alerted: &impl Fn() -> bool,
        deadline: Option<Instant>,
    ) -> WaitOutcome {
        let backoff = Backoff::new();
        loop {
            if ready() {
                return WaitOutcome::Ready;
            }
            if alerted() {
                return WaitOutcome::Alerted;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return WaitOutcome::TimedOut;
            }
            match self.strategy {
                WaitStrategy::BusySpin => std::hint::spin_loop(),
                WaitStrategy::Sleep if backoff.is_completed() => {
                    std::thread::sleep(Duration::from_micros(100))
                }
                _ => backoff.snooze(),
            }
        }
    }

    /// Wake every waiter so it re-checks its alert condition
    pub fn alert(&self) {
        let _guard = self.lock.lock();
        self.signal.notify_all();
    }
}

impl fmt::Debug for Waiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter").field("strategy", &self.strategy).finish()
    }
}
