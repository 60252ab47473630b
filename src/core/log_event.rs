//! Read-only event interface and the owned event memento
//!
//! Two concrete event types implement [`LogEvent`]: the reusable ring buffer
//! slot (`pipeline::RingBufferLogEvent`) and [`ImmutableLogEvent`]. Sinks only
//! ever see `&dyn LogEvent`, so they cannot mutate the event they receive.

use super::clock::EventInstant;
use super::location::SourceLocation;
use super::log_level::LogLevel;
use super::marker::Marker;
use super::message::FieldValue;
use super::thread_context::{ContextData, ContextStack};
use super::thrown::ThrownProxy;
use serde::{Serialize, Serializer};
use std::borrow::Cow;

/// Read-only view of one log event
pub trait LogEvent {
    fn logger_name(&self) -> &str;
    fn marker(&self) -> Option<&Marker>;
    fn level(&self) -> LogLevel;
    fn formatted_message(&self) -> Cow<'_, str>;
    /// Unformatted message pattern, if the message had one
    fn message_format(&self) -> Option<&str>;
    fn parameters(&self) -> &[FieldValue];
    fn thrown(&self) -> Option<&ThrownProxy>;
    fn context_data(&self) -> &ContextData;
    fn context_stack(&self) -> &ContextStack;
    fn thread_id(&self) -> u64;
    fn thread_name(&self) -> Option<&str>;
    fn thread_priority(&self) -> u8;
    fn source(&self) -> Option<&SourceLocation>;
    fn instant(&self) -> EventInstant;
    fn nano_time(&self) -> i64;
    /// True for the last event of a run of continuously available events
    fn is_end_of_batch(&self) -> bool;
    fn is_include_location(&self) -> bool;

    /// Copy this event into an owned memento that outlives the slot
    fn to_immutable(&self) -> ImmutableLogEvent {
        ImmutableLogEvent {
            logger_name: self.logger_name().to_string(),
            marker: self.marker().cloned(),
            level: self.level(),
            message: self.formatted_message().into_owned(),
            message_format: self.message_format().map(str::to_string),
            parameters: self.parameters().to_vec(),
            thrown: self.thrown().cloned(),
            context_data: self.context_data().clone(),
            context_stack: self.context_stack().clone(),
            thread_id: self.thread_id(),
            thread_name: self.thread_name().map(str::to_string),
            thread_priority: self.thread_priority(),
            source: self.source().copied(),
            instant: self.instant(),
            nano_time: self.nano_time(),
            end_of_batch: self.is_end_of_batch(),
            include_location: self.is_include_location(),
        }
    }
}

fn serialize_marker<S: Serializer>(marker: &Option<Marker>, serializer: S) -> Result<S::Ok, S::Error> {
    match marker {
        Some(m) => serializer.serialize_some(m.name()),
        None => serializer.serialize_none(),
    }
}

/// Owned, immutable event
#[derive(Debug, Clone, Serialize)]
pub struct ImmutableLogEvent {
    pub logger_name: String,
    #[serde(serialize_with = "serialize_marker", skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_format: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thrown: Option<ThrownProxy>,
    #[serde(skip_serializing_if = "ContextData::is_empty")]
    pub context_data: ContextData,
    #[serde(skip_serializing_if = "ContextStack::is_empty")]
    pub context_stack: ContextStack,
    pub thread_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
    pub thread_priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceLocation>,
    pub instant: EventInstant,
    pub nano_time: i64,
    pub end_of_batch: bool,
    pub include_location: bool,
}

impl ImmutableLogEvent {
    /// Create an event with the given core fields; all others empty
    pub fn new(logger_name: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            logger_name: logger_name.into(),
            marker: None,
            level,
            message: message.into(),
            message_format: None,
            parameters: Vec::new(),
            thrown: None,
            context_data: ContextData::default(),
            context_stack: ContextStack::default(),
            thread_id: 0,
            thread_name: None,
            thread_priority: super::thread_info::NORM_PRIORITY,
            source: None,
            instant: EventInstant::EPOCH,
            nano_time: 0,
            end_of_batch: false,
            include_location: false,
        }
    }

    #[must_use]
    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.marker = Some(marker);
        self
    }

    #[must_use]
    pub fn with_thrown(mut self, thrown: ThrownProxy) -> Self {
        self.thrown = Some(thrown);
        self
    }

    #[must_use]
    pub fn with_context_data(mut self, context_data: ContextData) -> Self {
        self.context_data = context_data;
        self
    }

    #[must_use]
    pub fn with_instant(mut self, instant: EventInstant) -> Self {
        self.instant = instant;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: SourceLocation) -> Self {
        self.source = Some(source);
        self
    }
}

impl LogEvent for ImmutableLogEvent {
    fn logger_name(&self) -> &str {
        &self.logger_name
    }

    fn marker(&self) -> Option<&Marker> {
        self.marker.as_ref()
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn formatted_message(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.message)
    }

    fn message_format(&self) -> Option<&str> {
        self.message_format.as_deref()
    }

    fn parameters(&self) -> &[FieldValue] {
        &self.parameters
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

    fn to_immutable(&self) -> ImmutableLogEvent {
        self.clone()
    }
}
