//! Diagnostic channel for the logging pipeline itself
//!
//! Internal failures (overflow, sink errors, shutdown timeouts) are reported
//! here instead of through the pipeline, so reporting can never recurse into
//! the queue it is reporting on.

use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;

/// Number of status records kept in memory
pub const DEFAULT_STATUS_HISTORY: usize = 200;

/// One internal diagnostic record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for StatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[LOGGER {}] {}", self.level, self.message)
    }
}

/// Bounded history of internal diagnostics, echoed to stderr at or above the
/// listener level.
///
/// # Example
///
/// ```
/// use rust_async_logger::core::{LogLevel, StatusLogger};
///
/// let status = StatusLogger::new();
/// status.set_listener_level(LogLevel::Off); // keep stderr quiet
/// status.warn("queue is full");
/// assert_eq!(status.count_at_least(LogLevel::Warn), 1);
/// ```
#[derive(Debug)]
pub struct StatusLogger {
    history: Mutex<VecDeque<StatusRecord>>,
    capacity: usize,
    listener_level: Mutex<LogLevel>,
}

impl StatusLogger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STATUS_HISTORY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            listener_level: Mutex::new(LogLevel::Warn),
        }
    }

    pub fn listener_level(&self) -> LogLevel {
        *self.listener_level.lock()
    }

    /// Records at or above `level` are echoed to stderr. `Off` silences stderr.
    pub fn set_listener_level(&self, level: LogLevel) {
        *self.listener_level.lock() = level;
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let record = StatusRecord {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        };

        if level.is_enabled_for(self.listener_level()) {
            eprintln!("{}", record);
        }

        let mut history = self.history.lock();
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back(record);
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Snapshot of the retained records, oldest first
    pub fn records(&self) -> Vec<StatusRecord> {
        self.history.lock().iter().cloned().collect()
    }

    /// Number of retained records at `level` or more severe
    pub fn count_at_least(&self, level: LogLevel) -> usize {
        self.history
            .lock()
            .iter()
            .filter(|r| r.level.is_enabled_for(level))
            .count()
    }

    /// True if any retained record contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.history.lock().iter().any(|r| r.message.contains(needle))
    }

    pub fn clear(&self) {
        self.history.lock().clear();
    }
}

impl Default for StatusLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> StatusLogger {
        let status = StatusLogger::new();
        status.set_listener_level(LogLevel::Off);
        status
    }

    #[test]
    fn test_records_are_kept_in_order() {
        let status = quiet();
        status.info("first");
        status.error("second");

        let records = status.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "first");
        assert_eq!(records[1].level, LogLevel::Error);
        assert_eq!(records[1].to_string(), "[LOGGER ERROR] second");
    }

    #[test]
    fn test_history_is_bounded() {
        let status = StatusLogger::with_capacity(3);
        status.set_listener_level(LogLevel::Off);
        for i in 0..10 {
            status.debug(format!("record {}", i));
        }

        let records = status.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].message, "record 7");
        assert_eq!(records[2].message, "record 9");
    }

    #[test]
    fn test_count_and_contains() {
        let status = quiet();
        status.debug("noise");
        status.warn("queue full");
        status.error("sink failed");

        assert_eq!(status.count_at_least(LogLevel::Warn), 2);
        assert!(status.contains("sink"));
        assert!(!status.contains("missing"));

        status.clear();
        assert!(status.records().is_empty());
    }

    #[test]
    fn test_default_listener_level() {
        assert_eq!(StatusLogger::new().listener_level(), LogLevel::Warn);
    }
}
