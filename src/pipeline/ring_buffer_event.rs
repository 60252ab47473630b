//! The reusable event slot stored in the ring buffer

use super::ring_buffer::SlotEvent;
use crate::core::clock::EventInstant;
use crate::core::location::SourceLocation;
use crate::core::log_event::LogEvent;
use crate::core::log_level::LogLevel;
use crate::core::marker::Marker;
use crate::core::message::{FieldValue, Message, ParameterizedMessage};
use crate::core::thread_context::{ContextData, ContextStack};
use crate::core::thread_info::{ThreadInfo, NORM_PRIORITY};
use crate::core::thrown::ThrownProxy;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Message text buffers larger than this are shrunk back when a slot is cleared
pub const MAX_REUSABLE_MESSAGE_SIZE: usize = 518;

/// Values staged for one event before they are moved into a slot
#[derive(Debug, Default)]
pub struct EventFields {
    pub logger_name: Option<Arc<str>>,
    pub marker: Option<Marker>,
    pub level: LogLevel,
    pub message: Option<Arc<dyn Message>>,
    pub thrown: Option<ThrownProxy>,
    pub context_data: ContextData,
    pub context_stack: ContextStack,
    pub thread: ThreadInfo,
    pub source: Option<SourceLocation>,
    pub include_location: bool,
    pub instant: EventInstant,
    pub nano_time: i64,
}

/// Mutable, pre-allocated event living in one ring buffer slot.
///
/// Populated in place by a producer, read by the consumer through
/// [`LogEvent`], then cleared before the slot is reused. A cleared slot holds
/// no references to the previous event and reports level `Off`.
pub struct RingBufferLogEvent {
    populated: bool,
    logger_name: Option<Arc<str>>,
    marker: Option<Marker>,
    level: LogLevel,
    message: Option<Arc<dyn Message>>,
    message_text: String,
    message_rendered: bool,
    thrown: Option<ThrownProxy>,
    context_data: ContextData,
    context_stack: ContextStack,
    thread_id: u64,
    thread_name: Option<Arc<str>>,
    thread_priority: u8,
    source: Option<SourceLocation>,
    include_location: bool,
    instant: EventInstant,
    nano_time: i64,
    end_of_batch: bool,
    sequence: i64,
}

impl Default for RingBufferLogEvent {
    fn default() -> Self {
        Self {
            populated: false,
            logger_name: None,
            marker: None,
            level: LogLevel::Off,
            message: None,
            message_text: String::new(),
            message_rendered: false,
            thrown: None,
            context_data: ContextData::default(),
            context_stack: ContextStack::default(),
            thread_id: 0,
            thread_name: None,
            thread_priority: NORM_PRIORITY,
            source: None,
            include_location: false,
            instant: EventInstant::EPOCH,
            nano_time: 0,
            end_of_batch: false,
            sequence: -1,
        }
    }
}

impl RingBufferLogEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move all staged values into this slot, leaving `fields` empty.
    ///
    /// With `render_message` the message is rendered into the slot's reusable
    /// text buffer now, on the producing thread.
    pub fn populate(&mut self, fields: &mut EventFields, render_message: bool, sequence: i64) {
        self.logger_name = fields.logger_name.take();
        self.marker = fields.marker.take();
        self.level = fields.level;
        self.message = fields.message.take();
        self.thrown = fields.thrown.take();
        self.context_data = std::mem::take(&mut fields.context_data);
        self.context_stack = std::mem::take(&mut fields.context_stack);
        self.thread_id = fields.thread.id;
        self.thread_name = fields.thread.name.take();
        self.thread_priority = fields.thread.priority;
        self.source = fields.source.take();
        self.include_location = fields.include_location;
        self.instant = fields.instant;
        self.nano_time = fields.nano_time;
        self.end_of_batch = false;
        self.sequence = sequence;

        self.message_text.clear();
        self.message_rendered = false;
        if render_message {
            self.render_message();
        }
        self.populated = true;
    }

    /// Copy another event into this slot
    pub fn init_from(&mut self, event: &dyn LogEvent, sequence: i64) {
        self.logger_name = Some(Arc::from(event.logger_name()));
        self.marker = event.marker().cloned();
        self.level = event.level();
        self.message = event.message_format().map(|format| {
            Arc::new(ParameterizedMessage::new(format, event.parameters().to_vec())) as Arc<dyn Message>
        });
        self.thrown = event.thrown().cloned();
        self.context_data = event.context_data().clone();
        self.context_stack = event.context_stack().clone();
        self.thread_id = event.thread_id();
        self.thread_name = event.thread_name().map(Arc::from);
        self.thread_priority = event.thread_priority();
        self.source = event.source().copied();
        self.include_location = event.is_include_location();
        self.instant = event.instant();
        self.nano_time = event.nano_time();
        self.end_of_batch = false;
        self.sequence = sequence;

        self.message_text.clear();
        self.message_text.push_str(&event.formatted_message());
        self.message_rendered = true;
        self.populated = true;
    }

    /// Render the message into the text buffer if that has not happened yet
    pub fn render_message(&mut self) {
        if self.message_rendered {
            return;
        }
        if let Some(message) = &self.message {
            message.format_to(&mut self.message_text);
        }
        self.message_rendered = true;
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn message(&self) -> Option<&Arc<dyn Message>> {
        self.message.as_ref()
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    pub fn set_end_of_batch(&mut self, end_of_batch: bool) {
        self.end_of_batch = end_of_batch;
    }

    /// Capacity of the reusable message buffer
    pub fn message_capacity(&self) -> usize {
        self.message_text.capacity()
    }

    /// Reset every reference field so the slot retains nothing of the event
    pub fn clear(&mut self) {
        self.populated = false;
        self.logger_name = None;
        self.marker = None;
        self.level = LogLevel::Off;
        self.message = None;
        self.message_rendered = false;
        self.thrown = None;
        self.context_data = ContextData::default();
        self.context_stack = ContextStack::default();
        self.thread_name = None;
        self.source = None;
        self.end_of_batch = false;

        self.message_text.clear();
        if self.message_text.capacity() > MAX_REUSABLE_MESSAGE_SIZE {
            self.message_text.shrink_to(MAX_REUSABLE_MESSAGE_SIZE);
        }
    }
}

impl SlotEvent for RingBufferLogEvent {
    fn clear(&mut self) {
        RingBufferLogEvent::clear(self);
    }

    fn is_populated(&self) -> bool {
        self.populated
    }
}

impl LogEvent for RingBufferLogEvent {
    fn logger_name(&self) -> &str {
        self.logger_name.as_deref().unwrap_or("")
    }

    fn marker(&self) -> Option<&Marker> {
        self.marker.as_ref()
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn formatted_message(&self) -> Cow<'_, str> {
        if self.message_rendered {
            return Cow::Borrowed(&self.message_text);
        }
        match &self.message {
            Some(message) => Cow::Owned(message.formatted_message()),
            None => Cow::Borrowed(""),
        }
    }

    fn message_format(&self) -> Option<&str> {
        self.message.as_ref().and_then(|m| m.format())
    }

    fn parameters(&self) -> &[FieldValue] {
        self.message.as_ref().map_or(&[], |m| m.parameters())
    }

    fn thrown(&self) -> Option<&ThrownProxy> {
        self.thrown.as_ref()
    }

    fn context_data(&self) -> &ContextData {
        &self.context_data
    }

    fn context_stack(&self) -> &ContextStack {
        &self.context_stack
    }

    fn thread_id(&self) -> u64 {
        self.thread_id
    }

    fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    fn thread_priority(&self) -> u8 {
        self.thread_priority
    }

    fn source(&self) -> Option<&SourceLocation> {
        self.source.as_ref()
    }

    fn instant(&self) -> EventInstant {
        self.instant
    }

    fn nano_time(&self) -> i64 {
        self.nano_time
    }

    fn is_end_of_batch(&self) -> bool {
        self.end_of_batch
    }

    fn is_include_location(&self) -> bool {
        self.include_location
    }
}

impl fmt::Debug for RingBufferLogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBufferLogEvent")
            .field("populated", &self.populated)
            .field("sequence", &self.sequence)
            .field("level", &self.level)
            .field("logger_name", &self.logger_name)
            .field("message", &self.formatted_message())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_event::ImmutableLogEvent;
    use crate::core::message::SimpleMessage;

    fn fields(message: Arc<dyn Message>) -> EventFields {
        EventFields {
            logger_name: Some(Arc::from("app.orders")),
            marker: Some(Marker::new("AUDIT")),
            level: LogLevel::Warn,
            message: Some(message),
            thrown: Some(ThrownProxy::new("IoError", "disk full")),
            context_data: [("order", "42")].into_iter().collect(),
            context_stack: ["checkout"].into_iter().collect(),
            thread: ThreadInfo {
                id: 9,
                name: Some(Arc::from("worker-1")),
                priority: 7,
            },
            source: Some(SourceLocation::new("src/orders.rs", 10, 1)),
            include_location: true,
            instant: EventInstant::from_epoch_millis(1_000),
            nano_time: 55,
        }
    }

    #[test]
    fn test_new_slot_is_empty() {
        let event = RingBufferLogEvent::new();
        assert!(!event.is_populated());
        assert_eq!(event.level(), LogLevel::Off);
        assert_eq!(event.formatted_message(), "");
    }

    #[test]
    fn test_populate_moves_values() {
        let message: Arc<dyn Message> =
            Arc::new(ParameterizedMessage::new("order {} shipped", vec![42.into()]));
        let mut staged = fields(message);
        let mut event = RingBufferLogEvent::new();
        event.populate(&mut staged, true, 3);

        assert!(event.is_populated());
        assert_eq!(event.sequence(), 3);
        assert_eq!(event.logger_name(), "app.orders");
        assert_eq!(event.level(), LogLevel::Warn);
        assert_eq!(event.formatted_message(), "order 42 shipped");
        assert_eq!(event.message_format(), Some("order {} shipped"));
        assert_eq!(event.parameters().len(), 1);
        assert_eq!(event.thread_name(), Some("worker-1"));
        assert_eq!(event.thread_priority(), 7);
        assert_eq!(event.context_data().get("order"), Some("42"));
        assert_eq!(event.context_stack().peek(), Some("checkout"));

        // The staging area no longer holds references
        assert!(staged.message.is_none());
        assert!(staged.thrown.is_none());
        assert!(staged.context_data.is_empty());
    }

    #[test]
    fn test_clear_releases_all_references() {
        let message: Arc<dyn Message> = Arc::new(SimpleMessage::new("x".repeat(4096)));
        let context: ContextData = [("k", "v")].into_iter().collect();
        let mut staged = fields(Arc::clone(&message));
        staged.context_data = context.clone();

        let mut event = RingBufferLogEvent::new();
        event.populate(&mut staged, true, 0);
        assert_eq!(Arc::strong_count(&message), 2);
        assert!(event.context_data().shares_storage_with(&context));
        assert!(event.message_capacity() >= 4096);

        event.clear();

        assert!(!event.is_populated());
        assert_eq!(Arc::strong_count(&message), 1);
        assert!(event.message().is_none());
        assert!(event.thrown().is_none());
        assert!(event.marker().is_none());
        assert!(event.context_data().is_empty());
        assert!(event.context_stack().is_empty());
        assert!(event.thread_name().is_none());
        assert!(event.source().is_none());
        assert_eq!(event.level(), LogLevel::Off);
        assert_eq!(event.formatted_message(), "");
        assert!(event.message_capacity() <= MAX_REUSABLE_MESSAGE_SIZE);
    }

    #[test]
    fn test_deferred_rendering() {
        let message: Arc<dyn Message> =
            Arc::new(ParameterizedMessage::new("{} + {}", vec![1.into(), 2.into()]));
        let mut staged = fields(message);
        let mut event = RingBufferLogEvent::new();
        event.populate(&mut staged, false, 0);

        assert_eq!(event.message_capacity(), 0);
        assert_eq!(event.formatted_message(), "1 + 2");
        event.render_message();
        assert!(matches!(event.formatted_message(), Cow::Borrowed("1 + 2")));
    }

    #[test]
    fn test_init_from_memento() {
        let memento = ImmutableLogEvent::new("bridge", LogLevel::Error, "copied")
            .with_marker(Marker::new("EXT"));
        let mut event = RingBufferLogEvent::new();
        event.init_from(&memento, 11);

        assert!(event.is_populated());
        assert_eq!(event.logger_name(), "bridge");
        assert_eq!(event.formatted_message(), "copied");
        assert_eq!(event.marker().map(Marker::name), Some("EXT"));

        let back = event.to_immutable();
        assert_eq!(back.message, "copied");
        assert_eq!(back.level, LogLevel::Error);
    }
}
