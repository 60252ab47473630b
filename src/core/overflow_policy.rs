//! Overflow policies for a full ring buffer
//!
//! When a publish finds no free slot, the policy decides whether the caller
//! waits for space, delivers the event itself, or drops it. Reentrant logging
//! (a sink that logs) is detected with a per-thread depth counter and always
//! delivered synchronously, since waiting on a queue that only the current
//! thread can drain would deadlock.

use super::log_level::LogLevel;
use super::metrics::PipelineMetrics;
use super::status::StatusLogger;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Discards between repeated overflow alerts
pub const DISCARD_ALERT_INTERVAL: u64 = 1000;

/// What to do with one event that found the ring buffer full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventRoute {
    /// Wait for a free slot, then publish
    Enqueue,
    /// Deliver to the sinks on the calling thread
    Synchronous,
    /// Drop the event
    Discard,
}

impl fmt::Display for EventRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventRoute::Enqueue => write!(f, "ENQUEUE"),
            EventRoute::Synchronous => write!(f, "SYNCHRONOUS"),
            EventRoute::Discard => write!(f, "DISCARD"),
        }
    }
}

/// Configured behaviour when the ring buffer is full
///
/// # Example
///
/// ```
/// use rust_async_logger::core::{EventRoute, LogLevel, QueueFullPolicy};
///
/// let policy = QueueFullPolicy::Discard { threshold: LogLevel::Info };
///
/// // Low-severity events are dropped, others wait for space
/// assert_eq!(policy.route(1, false, LogLevel::Debug), EventRoute::Discard);
/// assert_eq!(policy.route(1, false, LogLevel::Error), EventRoute::Enqueue);
///
/// // Reentrant logging is never queued
/// assert_eq!(policy.route(2, false, LogLevel::Error), EventRoute::Synchronous);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QueueFullPolicy {
    /// Block the producer until a slot frees up
    #[default]
    Enqueue,

    /// Deliver on the producer thread, bypassing the queue
    Synchronous,

    /// Drop events at `threshold` or less severe; treat the rest as `Enqueue`
    Discard { threshold: LogLevel },
}

impl QueueFullPolicy {
    /// Decide the route for an event that found the buffer full.
    ///
    /// `recursion_depth` is the calling thread's logging depth (1 for a plain
    /// call, more when a sink logs). `on_consumer_thread` is true when the
    /// caller is the pipeline's own consumer.
    pub fn route(&self, recursion_depth: usize, on_consumer_thread: bool, level: LogLevel) -> EventRoute {
        if recursion_depth > 1 {
            return EventRoute::Synchronous;
        }
        if let QueueFullPolicy::Discard { threshold } = self {
            if level.is_less_specific_than(*threshold) {
                return EventRoute::Discard;
            }
        }
        if on_consumer_thread {
            // The consumer must never wait on its own queue
            return EventRoute::Synchronous;
        }
        match self {
            QueueFullPolicy::Synchronous => EventRoute::Synchronous,
            QueueFullPolicy::Enqueue | QueueFullPolicy::Discard { .. } => EventRoute::Enqueue,
        }
    }
}

impl fmt::Display for QueueFullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueFullPolicy::Enqueue => write!(f, "Enqueue"),
            QueueFullPolicy::Synchronous => write!(f, "Synchronous"),
            QueueFullPolicy::Discard { threshold } => write!(f, "Discard({})", threshold),
        }
    }
}

/// Callback type for discard notifications
///
/// Called on the first discard and every [`DISCARD_ALERT_INTERVAL`]th discard
/// after that. The parameter is the total number of discarded events so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Per-pipeline overflow bookkeeping: warn-once flags and the discard callback
pub struct OverflowState {
    discard_warned: AtomicBool,
    out_of_order_warned: AtomicBool,
    on_discard: Option<OverflowCallback>,
}

impl OverflowState {
    pub fn new(on_discard: Option<OverflowCallback>) -> Self {
        Self {
            discard_warned: AtomicBool::new(false),
            out_of_order_warned: AtomicBool::new(false),
            on_discard,
        }
    }

    /// Count a discarded event and alert on the first and every
    /// [`DISCARD_ALERT_INTERVAL`]th discard
    pub fn record_discard(&self, level: LogLevel, metrics: &PipelineMetrics, status: &StatusLogger) {
        let previous = metrics.record_discarded();
        let total = previous + 1;

        if !self.discard_warned.swap(true, Ordering::AcqRel) {
            status.warn(format!(
                "Async queue is full, discarding event with level {}. \
                 This message will only appear once; further low-severity events \
                 are silently discarded until queue capacity becomes available.",
                level
            ));
        } else if total % DISCARD_ALERT_INTERVAL == 0 {
            status.warn(format!(
                "Async queue is full, {} events discarded. \
                 Consider increasing the ring buffer size.",
                total
            ));
        }

        if previous == 0 || total % DISCARD_ALERT_INTERVAL == 0 {
            if let Some(ref callback) = self.on_discard {
                callback(total);
            }
        }
    }

    /// Warn once that synchronous delivery may reorder events
    pub fn warn_out_of_order_once(&self, status: &StatusLogger) {
        if !self.out_of_order_warned.swap(true, Ordering::AcqRel) {
            status.warn(
                "Async queue is full, delivering events on the calling thread. \
                 Events may appear out of order.",
            );
        }
    }
}

impl Default for OverflowState {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for OverflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverflowState")
            .field("discard_warned", &self.discard_warned.load(Ordering::Relaxed))
            .field("out_of_order_warned", &self.out_of_order_warned.load(Ordering::Relaxed))
            .field("on_discard", &self.on_discard.is_some())
            .finish()
    }
}

thread_local! {
    static RECURSION_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// RAII guard that counts nested logging on the current thread.
///
/// Entered around every producer call and around every sink invocation;
/// dropping the guard (including during unwinding) restores the depth, so
/// pooled threads never inherit a stale count.
pub struct RecursionGuard {
    _not_send: PhantomData<*const ()>,
}

impl RecursionGuard {
    pub fn enter() -> Self {
        RECURSION_DEPTH.with(|d| d.set(d.get() + 1));
        Self {
            _not_send: PhantomData,
        }
    }

    /// Depth of the current thread, including this guard
    pub fn depth() -> usize {
        RECURSION_DEPTH.with(Cell::get)
    }
}

impl Drop for RecursionGuard {
    fn drop(&mut self) {
        RECURSION_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}
