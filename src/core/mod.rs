//! Core logger types and traits

pub mod clock;
pub mod config;
pub mod error;
pub mod location;
pub mod log_event;
pub mod log_level;
pub mod logger;
pub mod marker;
pub mod message;
pub mod metrics;
pub mod overflow_policy;
pub mod sink;
pub mod status;
pub mod thread_context;
pub mod thread_info;
pub mod thrown;
pub mod timestamp;

pub use clock::{Clock, DummyNanoClock, EventInstant, FixedClock, NanoClock, SystemClock, SystemNanoClock};
pub use config::{AsyncConfig, AsyncConfigBuilder, DEFAULT_RING_BUFFER_SIZE, DEFAULT_SHUTDOWN_TIMEOUT};
pub use error::{LoggerError, Result};
pub use location::SourceLocation;
pub use log_event::{ImmutableLogEvent, LogEvent};
pub use log_level::LogLevel;
pub use logger::{AsyncLogger, LoggerBuilder, LoggerContext};
pub use marker::Marker;
pub use message::{FieldValue, Message, ParameterizedMessage, SimpleMessage};
pub use metrics::PipelineMetrics;
pub use overflow_policy::{EventRoute, OverflowCallback, QueueFullPolicy, RecursionGuard};
pub use sink::Sink;
pub use status::{StatusLogger, StatusRecord};
pub use thread_context::{ContextData, ContextGuard, ContextStack, StackGuard, ThreadContext};
pub use thread_info::{ThreadInfo, ThreadNameCaching};
pub use thrown::{StackFrame, ThrownProxy};
pub use timestamp::TimestampFormat;
