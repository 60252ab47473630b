//! Plain text layout shared by the text sinks

use crate::core::{LogEvent, TimestampFormat};
use std::fmt::Write;

/// Renders `[timestamp] [LEVEL] [thread] logger - message {ctx} [stack]`.
///
/// Newlines, carriage returns and tabs in the message are escaped so one
/// event always produces one line; an attached error follows on indented
/// lines of its own.
#[derive(Debug, Clone, Default)]
pub struct TextLayout {
    timestamp_format: TimestampFormat,
}

impl TextLayout {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Use a strftime-compatible format string for timestamps
    #[must_use]
    pub fn with_custom_timestamp(mut self, format_str: &str) -> Self {
        self.timestamp_format = TimestampFormat::Custom(format_str.to_string());
        self
    }

    pub fn timestamp_format(&self) -> &TimestampFormat {
        &self.timestamp_format
    }

    pub fn format(&self, event: &dyn LogEvent) -> String {
        self.format_with_level(event, &format!("{:5}", event.level()))
    }

    /// Format with a pre-rendered level column, e.g. a coloured one
    pub fn format_with_level(&self, event: &dyn LogEvent, level: &str) -> String {
        let thread = match event.thread_name() {
            Some(name) => name.to_string(),
            None => format!("thread-{}", event.thread_id()),
        };

        let mut output = format!(
            "[{}] [{}] [{}] {}",
            self.timestamp_format.format_instant(&event.instant()),
            level,
            thread,
            event.logger_name()
        );

        if let Some(marker) = event.marker() {
            let _ = write!(output, " [{}]", marker.name());
        }
        output.push_str(" - ");
        escape_into(&mut output, &event.formatted_message());

        let context = event.context_data();
        if !context.is_empty() {
            output.push(' ');
            output.push_str(&context.format_fields());
        }
        let stack = event.context_stack();
        if stack.depth() > 0 {
            let _ = write!(output, " {}", stack);
        }
        if let Some(source) = event.source() {
            let _ = write!(output, " ({})", source);
        }
        if let Some(thrown) = event.thrown() {
            for line in thrown.to_string().lines() {
                output.push_str("\n    ");
                output.push_str(line.trim_start_matches('\t'));
            }
        }

        output
    }
}

fn escape_into(output: &mut String, message: &str) {
    for c in message.chars() {
        match c {
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c => output.push(c),
        }
    }
}
