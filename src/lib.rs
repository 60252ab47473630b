//! # Rust Async Logger
//!
//! A low-latency asynchronous logging pipeline. Application threads publish
//! events into a pre-allocated ring buffer and return immediately; a single
//! background thread drains the buffer in publish order and hands each event
//! to the configured sinks.
//!
//! ## Features
//!
//! - **Pre-allocated slots**: events are written into reusable ring buffer
//!   slots, so steady-state logging does not allocate per event
//! - **Ordering**: events are consumed in the order their slots were claimed
//! - **Overflow policies**: wait for space, deliver on the calling thread, or
//!   discard low-severity events when the buffer is full
//! - **Reentrancy safe**: a sink that logs can never deadlock the pipeline
//! - **Graceful shutdown**: drain with a deadline, then report what was lost
//!
//! ## Example
//!
//! ```
//! use rust_async_logger::prelude::*;
//! use std::time::Duration;
//!
//! let (sink, events) = ChannelSink::unbounded();
//! let context = LoggerContext::builder()
//!     .config(AsyncConfig::builder().ring_buffer_size(1024).build())
//!     .sink(sink)
//!     .build()
//!     .unwrap();
//!
//! let logger = context.logger("app");
//! logger.info("started");
//!
//! let report = context.stop(Duration::from_secs(1));
//! assert_eq!(report.abandoned, 0);
//! assert_eq!(events.try_recv().unwrap().message, "started");
//! ```

pub mod core;
pub mod macros;
pub mod pipeline;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        AsyncConfig, AsyncLogger, ContextGuard, FieldValue, ImmutableLogEvent, LogEvent, LogLevel,
        LoggerBuilder, LoggerContext, LoggerError, Marker, OverflowCallback, QueueFullPolicy, Result,
        Sink, ThreadContext, TimestampFormat,
    };
    pub use crate::pipeline::{ShutdownReport, WaitStrategy};
    pub use crate::sinks::ChannelSink;
    #[cfg(feature = "console")]
    pub use crate::sinks::ConsoleSink;
    #[cfg(feature = "file")]
    pub use crate::sinks::FileSink;
}

pub use core::{
    AsyncConfig, AsyncLogger, ContextGuard, FieldValue, ImmutableLogEvent, LogEvent, LogLevel,
    LoggerBuilder, LoggerContext, LoggerError, Marker, OverflowCallback, PipelineMetrics,
    QueueFullPolicy, Result, Sink, SourceLocation, StatusLogger, ThreadContext, TimestampFormat,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use pipeline::{LifecycleState, ShutdownReport, WaitStrategy};
