//! Stages the values of one logging call before they enter a slot
//!
//! All thread-dependent state (thread identity, context snapshots, timestamps)
//! is captured here on the calling thread. The translator never touches the
//! ring buffer; it is handed to a publish call which moves the staged values
//! into the claimed slot.

use super::ring_buffer_event::{EventFields, RingBufferLogEvent};
use crate::core::clock::{Clock, NanoClock};
use crate::core::location::SourceLocation;
use crate::core::log_level::LogLevel;
use crate::core::marker::Marker;
use crate::core::message::Message;
use crate::core::thread_context::ThreadContext;
use crate::core::thread_info::{ThreadInfo, ThreadNameCaching};
use crate::core::thrown::ThrownProxy;
use std::cell::Cell;
use std::sync::Arc;

/// Arguments of one logging call
#[derive(Debug)]
pub struct LogCall {
    pub logger_name: Arc<str>,
    pub marker: Option<Marker>,
    pub level: LogLevel,
    pub message: Arc<dyn Message>,
    pub thrown: Option<ThrownProxy>,
    /// Location supplied by the caller, if any
    pub location: Option<SourceLocation>,
}

impl LogCall {
    pub fn new(logger_name: Arc<str>, level: LogLevel, message: Arc<dyn Message>) -> Self {
        Self {
            logger_name,
            marker: None,
            level,
            message,
            thrown: None,
            location: None,
        }
    }

    #[must_use]
    pub fn with_marker(mut self, marker: Option<Marker>) -> Self {
        self.marker = marker;
        self
    }

    #[must_use]
    pub fn with_thrown(mut self, thrown: Option<ThrownProxy>) -> Self {
        self.thrown = thrown;
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// Per-pipeline translation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TranslatorSettings {
    pub include_location: bool,
    /// Render messages on the producer thread
    pub render_message: bool,
    pub thread_name_caching: ThreadNameCaching,
}

/// Staging area for one event
#[derive(Debug, Default)]
pub struct EventTranslator {
    fields: EventFields,
    render_message: bool,
}

thread_local! {
    static CACHED_TRANSLATOR: Cell<Option<EventTranslator>> = const { Cell::new(None) };
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with this thread's cached translator.
    ///
    /// The translator is taken out of the cache for the duration of `f`, so a
    /// nested logging call on the same thread gets a fresh one instead of
    /// clobbering the staged values.
    pub fn with_cached<R>(f: impl FnOnce(&mut EventTranslator) -> R) -> R {
        let mut translator = CACHED_TRANSLATOR.with(Cell::take).unwrap_or_default();
        let result = f(&mut translator);
        translator.clear();
        CACHED_TRANSLATOR.with(|cached| cached.set(Some(translator)));
        result
    }

    /// Capture everything needed to populate a slot.
    ///
    /// `locate` is only called when location is configured and the call did
    /// not carry one.
    pub fn stage(
        &mut self,
        call: LogCall,
        settings: &TranslatorSettings,
        clock: &dyn Clock,
        nano_clock: &dyn NanoClock,
        locate: impl FnOnce() -> Option<SourceLocation>,
    ) {
        let source = match call.location {
            Some(location) => Some(location),
            None if settings.include_location => locate(),
            None => None,
        };

        self.fields = EventFields {
            logger_name: Some(call.logger_name),
            marker: call.marker,
            level: call.level,
            message: Some(call.message),
            thrown: call.thrown,
            // O(1) snapshots; later mutation on this thread copies
            context_data: ThreadContext::context_data(),
            context_stack: ThreadContext::context_stack(),
            thread: ThreadInfo::current(settings.thread_name_caching),
            source,
            include_location: settings.include_location,
            instant: clock.now(),
            nano_time: nano_clock.nano_time(),
        };
        self.render_message = settings.render_message;
    }

    pub fn level(&self) -> LogLevel {
        self.fields.level
    }

    pub fn is_staged(&self) -> bool {
        self.fields.message.is_some()
    }

    /// Move the staged values into `event`
    pub fn translate_to(&mut self, event: &mut RingBufferLogEvent, sequence: i64) {
        event.populate(&mut self.fields, self.render_message, sequence);
    }

    /// Build a standalone event from the staged values, for delivery outside
    /// the ring buffer
    pub fn to_detached_event(&mut self) -> RingBufferLogEvent {
        let mut event = RingBufferLogEvent::new();
        event.populate(&mut self.fields, true, -1);
        event
    }

    /// Release every staged reference
    pub fn clear(&mut self) {
        self.fields = EventFields::default();
    }
}
