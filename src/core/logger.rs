//! Producer-facing logger and the context that owns one pipeline

use super::{
    clock::{Clock, DummyNanoClock, NanoClock, SystemClock},
    config::AsyncConfig,
    error::Result,
    location::SourceLocation,
    log_event::LogEvent,
    log_level::LogLevel,
    marker::Marker,
    message::{FieldValue, Message, ParameterizedMessage, SimpleMessage},
    metrics::PipelineMetrics,
    overflow_policy::{EventRoute, OverflowCallback, OverflowState, RecursionGuard, DISCARD_ALERT_INTERVAL},
    sink::Sink,
    status::StatusLogger,
    thrown::ThrownProxy,
};
use crate::pipeline::{
    Dispatcher, EventTranslator, LifecycleState, LogCall, Pipeline, RunningPipeline, ShutdownReport,
    TranslatorSettings,
};
use parking_lot::RwLock;
use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

/// Shared state of one logging context
struct ContextShared {
    config: AsyncConfig,
    settings: TranslatorSettings,
    min_level: RwLock<LogLevel>,
    status: Arc<StatusLogger>,
    metrics: Arc<PipelineMetrics>,
    overflow: OverflowState,
    clock: Arc<dyn Clock>,
    nano_clock: Arc<dyn NanoClock>,
    dispatcher: Arc<Dispatcher>,
    pipeline: Pipeline,
}

impl ContextShared {
    fn is_enabled(&self, level: LogLevel) -> bool {
        level.is_enabled_for(*self.min_level.read())
    }

    fn ignore_after_shutdown(&self, level: LogLevel) {
        let previous = self.metrics.record_ignored_after_shutdown();
        if previous % DISCARD_ALERT_INTERVAL == 0 {
            self.status.warn(format!(
                "Ignoring log event with level {} after async pipeline '{}' was stopped",
                level, self.config.context_name
            ));
        }
    }

    fn route(&self, running: &RunningPipeline, level: LogLevel) -> EventRoute {
        self.metrics.record_queue_full();
        self.config
            .queue_full_policy
            .route(RecursionGuard::depth(), running.is_consumer_thread(), level)
    }

    fn publish_call(&self, call: LogCall, caller: &'static Location<'static>) {
        let _depth = RecursionGuard::enter();
        let Some(running) = self.pipeline.running() else {
            self.ignore_after_shutdown(call.level);
            return;
        };

        EventTranslator::with_cached(|translator| {
            translator.stage(call, &self.settings, &*self.clock, &*self.nano_clock, || {
                Some(SourceLocation::from(caller))
            });

            if running.try_publish(translator) {
                self.metrics.record_published();
                return;
            }
            if running.is_halted() {
                self.ignore_after_shutdown(translator.level());
                return;
            }

            match self.route(&running, translator.level()) {
                EventRoute::Enqueue => {
                    self.metrics.record_block();
                    if running.enqueue(translator, self.config.synchronize_enqueue_when_queue_full) {
                        self.metrics.record_published();
                    } else {
                        self.ignore_after_shutdown(translator.level());
                    }
                }
                EventRoute::Synchronous => {
                    self.overflow.warn_out_of_order_once(&self.status);
                    self.metrics.record_synchronous();
                    let event = translator.to_detached_event();
                    self.dispatcher.deliver(&event);
                }
                EventRoute::Discard => {
                    self.overflow
                        .record_discard(translator.level(), &self.metrics, &self.status);
                }
            }
        });
    }

    fn publish_event(&self, event: &dyn LogEvent) {
        let _depth = RecursionGuard::enter();
        let level = event.level();
        let Some(running) = self.pipeline.running() else {
            self.ignore_after_shutdown(level);
            return;
        };

        if running.try_publish_event(event) {
            self.metrics.record_published();
            return;
        }
        if running.is_halted() {
            self.ignore_after_shutdown(level);
            return;
        }

        match self.route(&running, level) {
            EventRoute::Enqueue => {
                self.metrics.record_block();
                if running.enqueue_event(event, self.config.synchronize_enqueue_when_queue_full) {
                    self.metrics.record_published();
                } else {
                    self.ignore_after_shutdown(level);
                }
            }
            EventRoute::Synchronous => {
                self.overflow.warn_out_of_order_once(&self.status);
                self.metrics.record_synchronous();
                self.dispatcher.deliver(event);
            }
            EventRoute::Discard => self.overflow.record_discard(level, &self.metrics, &self.status),
        }
    }
}

/// Owns one asynchronous pipeline and everything it shares with its loggers.
///
/// Dropping the context stops the pipeline with the configured shutdown
/// timeout. Loggers obtained from it keep working after that, but their
/// events are ignored (and counted) until the context is started again.
pub struct LoggerContext {
    shared: Arc<ContextShared>,
}

impl LoggerContext {
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Start the pipeline. A no-op if already started.
    pub fn start(&self) -> Result<()> {
        self.shared.pipeline.start()
    }

    /// Stop accepting events and drain for up to `timeout`.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_async_logger::prelude::*;
    /// use std::time::Duration;
    ///
    /// let context = LoggerContext::builder().build().unwrap();
    /// context.logger("app").info("shutting down");
    ///
    /// let report = context.stop(Duration::from_secs(2));
    /// if report.abandoned > 0 {
    ///     eprintln!("{} events were lost", report.abandoned);
    /// }
    /// ```
    pub fn stop(&self, timeout: Duration) -> ShutdownReport {
        self.shared.pipeline.stop(timeout)
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.pipeline.state()
    }

    pub fn is_started(&self) -> bool {
        self.shared.pipeline.is_started()
    }

    /// A named logger publishing into this context
    pub fn logger(&self, name: impl AsRef<str>) -> AsyncLogger {
        AsyncLogger {
            name: Arc::from(name.as_ref()),
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn config(&self) -> &AsyncConfig {
        &self.shared.config
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.shared.metrics
    }

    pub fn status(&self) -> &StatusLogger {
        &self.shared.status
    }

    pub fn min_level(&self) -> LogLevel {
        *self.shared.min_level.read()
    }

    pub fn set_min_level(&self, level: LogLevel) {
        *self.shared.min_level.write() = level;
    }

    /// Free ring buffer slots, or `None` when stopped. Heuristic only.
    pub fn remaining_capacity(&self) -> Option<usize> {
        self.shared.pipeline.remaining_capacity()
    }

    /// Flush every sink from the calling thread
    pub fn flush(&self) {
        self.shared.dispatcher.flush_all();
    }
}

impl Drop for LoggerContext {
    fn drop(&mut self) {
        if self.shared.pipeline.state() != LifecycleState::Stopped {
            self.shared.pipeline.stop(self.shared.config.shutdown_timeout());
        }
    }
}

impl fmt::Debug for LoggerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerContext")
            .field("config", &self.shared.config)
            .field("pipeline", &self.shared.pipeline)
            .field("dispatcher", &self.shared.dispatcher)
            .finish()
    }
}

/// Cheap, cloneable handle that publishes events into a [`LoggerContext`].
///
/// Logging methods never fail and never panic because of the pipeline: when
/// the queue is full the configured policy applies, and after the context is
/// stopped events are ignored and counted.
#[derive(Clone)]
pub struct AsyncLogger {
    name: Arc<str>,
    shared: Arc<ContextShared>,
}

impl AsyncLogger {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.shared.is_enabled(level)
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if !self.is_enabled(level) {
            return;
        }
        let call = LogCall::new(Arc::clone(&self.name), level, Arc::new(SimpleMessage::new(message)));
        self.shared.publish_call(call, Location::caller());
    }

    /// Log a message object with an optional marker and error
    #[track_caller]
    pub fn log_message(
        &self,
        level: LogLevel,
        marker: Option<&Marker>,
        message: Arc<dyn Message>,
        thrown: Option<ThrownProxy>,
    ) {
        if !self.is_enabled(level) {
            return;
        }
        let call = LogCall::new(Arc::clone(&self.name), level, message)
            .with_marker(marker.cloned())
            .with_thrown(thrown);
        self.shared.publish_call(call, Location::caller());
    }

    /// Log a `{}` pattern; the parameters are substituted when the message
    /// is rendered
    #[track_caller]
    pub fn log_params(&self, level: LogLevel, pattern: impl Into<String>, parameters: Vec<FieldValue>) {
        if !self.is_enabled(level) {
            return;
        }
        let message = Arc::new(ParameterizedMessage::new(pattern, parameters));
        let call = LogCall::new(Arc::clone(&self.name), level, message);
        self.shared.publish_call(call, Location::caller());
    }

    /// Log a message together with an error and its cause chain
    #[track_caller]
    pub fn log_error<E: Error + 'static>(&self, level: LogLevel, message: impl Into<String>, error: &E) {
        if !self.is_enabled(level) {
            return;
        }
        let call = LogCall::new(Arc::clone(&self.name), level, Arc::new(SimpleMessage::new(message)))
            .with_thrown(Some(ThrownProxy::from_error(error)));
        self.shared.publish_call(call, Location::caller());
    }

    /// Log with an explicit source location, as the logging macros do
    #[track_caller]
    pub fn log_at(&self, level: LogLevel, location: SourceLocation, message: impl Into<String>) {
        if !self.is_enabled(level) {
            return;
        }
        let call = LogCall::new(Arc::clone(&self.name), level, Arc::new(SimpleMessage::new(message)))
            .with_location(location);
        self.shared.publish_call(call, Location::caller());
    }

    /// Publish an event built elsewhere; it is copied into a slot
    pub fn log_event(&self, event: &dyn LogEvent) {
        if !self.is_enabled(event.level()) {
            return;
        }
        self.shared.publish_event(event);
    }

    #[track_caller]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[track_caller]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    #[track_caller]
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }
}

impl fmt::Debug for AsyncLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncLogger")
            .field("name", &self.name)
            .field("context", &self.shared.config.context_name)
            .finish()
    }
}

/// Builder for [`LoggerContext`]
///
/// # Example
///
/// ```
/// use rust_async_logger::prelude::*;
/// use std::sync::Arc;
///
/// let context = LoggerContext::builder()
///     .min_level(LogLevel::Debug)
///     .config(AsyncConfig::builder().ring_buffer_size(1024).build())
///     .on_discard(Arc::new(|count| {
///         eprintln!("ALERT: {} events discarded", count);
///     }))
///     .build()
///     .unwrap();
///
/// context.logger("app").debug("ready");
/// ```
pub struct LoggerBuilder {
    config: AsyncConfig,
    min_level: LogLevel,
    sinks: Vec<Arc<dyn Sink>>,
    on_discard: Option<OverflowCallback>,
    clock: Arc<dyn Clock>,
    nano_clock: Arc<dyn NanoClock>,
    status: Option<Arc<StatusLogger>>,
    auto_start: bool,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            config: AsyncConfig::default(),
            min_level: LogLevel::Info,
            sinks: Vec::new(),
            on_discard: None,
            clock: Arc::new(SystemClock),
            nano_clock: Arc::new(DummyNanoClock::default()),
            status: None,
            auto_start: true,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: AsyncConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Add a sink; sinks receive events in the order they were added
    #[must_use = "builder methods return a new value"]
    pub fn sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Add a sink that the caller keeps a handle to
    #[must_use = "builder methods return a new value"]
    pub fn shared_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Called on the first discarded event and every 1000th after that
    #[must_use = "builder methods return a new value"]
    pub fn on_discard(mut self, callback: OverflowCallback) -> Self {
        self.on_discard = Some(callback);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn nano_clock(mut self, nano_clock: Arc<dyn NanoClock>) -> Self {
        self.nano_clock = nano_clock;
        self
    }

    /// Use an existing status logger, e.g. one shared between contexts
    #[must_use = "builder methods return a new value"]
    pub fn status_logger(mut self, status: Arc<StatusLogger>) -> Self {
        self.status = Some(status);
        self
    }

    /// Start the pipeline in `build()` (the default)
    #[must_use = "builder methods return a new value"]
    pub fn auto_start(mut self, enabled: bool) -> Self {
        self.auto_start = enabled;
        self
    }

    /// Build the context, starting its pipeline unless `auto_start(false)`
    pub fn build(self) -> Result<LoggerContext> {
        self.config.validate()?;

        let status = self.status.unwrap_or_default();
        let metrics = Arc::new(PipelineMetrics::new());
        let dispatcher = Arc::new(Dispatcher::new(self.sinks, Arc::clone(&metrics), Arc::clone(&status)));
        let pipeline = Pipeline::new(
            self.config.clone(),
            Arc::clone(&dispatcher),
            Arc::clone(&metrics),
            Arc::clone(&status),
        );

        let context = LoggerContext {
            shared: Arc::new(ContextShared {
                settings: self.config.translator_settings(),
                config: self.config,
                min_level: RwLock::new(self.min_level),
                status,
                metrics,
                overflow: OverflowState::new(self.on_discard),
                clock: self.clock,
                nano_clock: self.nano_clock,
                dispatcher,
                pipeline,
            }),
        };

        if self.auto_start {
            context.start()?;
        }
        Ok(context)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::overflow_policy::QueueFullPolicy;
    use parking_lot::Mutex;
    use std::thread;
    use std::time::Instant;

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<(LogLevel, String, Option<SourceLocation>)>>,
    }

    impl Sink for Recording {
        fn log(&self, event: &dyn LogEvent) -> Result<()> {
            self.events
                .lock()
                .push((event.level(), event.formatted_message().into_owned(), event.source().copied()));
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn quiet() -> Arc<StatusLogger> {
        let status = Arc::new(StatusLogger::new());
        status.set_listener_level(LogLevel::Off);
        status
    }

    fn wait_for(sink: &Recording, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.events.lock().len() < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_builder_basic() {
        let context = LoggerContext::builder()
            .min_level(LogLevel::Debug)
            .status_logger(quiet())
            .build()
            .unwrap();

        assert!(context.is_started());
        assert_eq!(context.min_level(), LogLevel::Debug);
        assert_eq!(context.metrics().discarded_count(), 0);
        assert_eq!(context.remaining_capacity(), Some(context.config().ring_buffer_capacity()));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = AsyncConfig::default();
        config.context_name = String::new();
        assert!(LoggerContext::builder().config(config).build().is_err());
    }

    #[test]
    fn test_events_reach_sinks_with_level_filter() {
        let sink = Arc::new(Recording::default());
        let context = LoggerContext::builder()
            .shared_sink(sink.clone())
            .status_logger(quiet())
            .build()
            .unwrap();
        let logger = context.logger("app");

        logger.debug("filtered");
        logger.info("kept");
        logger.log_params(LogLevel::Warn, "user {} failed {} times", vec!["bob".into(), 3.into()]);
        wait_for(&sink, 2);

        let report = context.stop(Duration::from_secs(5));
        assert!(report.is_clean());
        let events = sink.events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].1, "kept");
        assert_eq!(events[1].1, "user bob failed 3 times");
        assert_eq!(context.metrics().published_count(), 2);
    }

    #[test]
    fn test_location_is_captured_when_configured() {
        let sink = Arc::new(Recording::default());
        let context = LoggerContext::builder()
            .config(AsyncConfig::builder().include_location(true).build())
            .shared_sink(sink.clone())
            .status_logger(quiet())
            .build()
            .unwrap();

        context.logger("app").info("here");
        context.stop(Duration::from_secs(5));

        let events = sink.events.lock();
        let source = events[0].2.expect("location captured");
        assert!(source.file.ends_with("logger.rs"));
    }

    #[test]
    fn test_events_after_stop_are_ignored_and_counted() {
        let sink = Arc::new(Recording::default());
        let status = quiet();
        let context = LoggerContext::builder()
            .shared_sink(sink.clone())
            .status_logger(Arc::clone(&status))
            .build()
            .unwrap();
        let logger = context.logger("app");

        context.stop(Duration::from_secs(5));
        logger.error("too late");

        assert_eq!(context.metrics().ignored_after_shutdown_count(), 1);
        assert!(status.contains("after async pipeline 'default' was stopped"));
        assert!(sink.events.lock().is_empty());
    }

    #[test]
    fn test_discard_policy_drops_low_levels_when_full() {
        let gate = Arc::new(Mutex::new(()));
        struct Gated(Arc<Mutex<()>>, Arc<Recording>);
        impl Sink for Gated {
            fn log(&self, event: &dyn LogEvent) -> Result<()> {
                let _open = self.0.lock();
                self.1.log(event)
            }
            fn name(&self) -> &str {
                "gated"
            }
        }

        let recorded = Arc::new(Recording::default());
        let discards = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let context = LoggerContext::builder()
            .config(
                AsyncConfig::builder()
                    .ring_buffer_size(8)
                    .queue_full_policy(QueueFullPolicy::Discard {
                        threshold: LogLevel::Info,
                    })
                    .build(),
            )
            .sink(Gated(Arc::clone(&gate), Arc::clone(&recorded)))
            .on_discard({
                let discards = Arc::clone(&discards);
                Arc::new(move |total| discards.store(total, std::sync::atomic::Ordering::SeqCst))
            })
            .status_logger(quiet())
            .build()
            .unwrap();
        let logger = context.logger("app");

        let closed = gate.lock();
        // The consumer cannot release any slot while the gate is closed
        for i in 0..8 {
            logger.warn(format!("queued {}", i));
        }
        logger.info("dropped");
        assert_eq!(context.metrics().queue_full_events(), 1);
        drop(closed);

        context.stop(Duration::from_secs(5));
        assert_eq!(context.metrics().discarded_count(), 1);
        assert_eq!(discards.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(recorded.events.lock().len(), 8);
    }
}
