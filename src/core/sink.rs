//! Sink trait for downstream event consumers

use super::{error::Result, log_event::LogEvent};

/// Receives drained events.
///
/// Sinks are shared between the consumer thread and callers that deliver
/// synchronously, so they take `&self` and synchronize internally. A sink may
/// itself log through the pipeline; that nested call is delivered on the
/// current thread if the queue is full.
///
/// # Example
///
/// ```
/// use rust_async_logger::core::{LogEvent, Result, Sink};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct CountingSink(AtomicUsize);
///
/// impl Sink for CountingSink {
///     fn log(&self, _event: &dyn LogEvent) -> Result<()> {
///         self.0.fetch_add(1, Ordering::Relaxed);
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "counting"
///     }
/// }
/// ```
pub trait Sink: Send + Sync {
    fn log(&self, event: &dyn LogEvent) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;
}
