//! Immutable log messages
//!
//! A [`Message`] is built by the caller and handed to the pipeline behind an
//! `Arc`. Once queued it is only ever read: either rendered on the producer
//! thread into the slot's text buffer, or rendered lazily by the consumer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value type for structured message parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<usize> for FieldValue {
    fn from(i: usize) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// A log message as produced by the logging API layer.
///
/// Implementations must be immutable once handed to the pipeline.
pub trait Message: Send + Sync + fmt::Debug {
    /// Append the rendered message to `buffer`
    fn format_to(&self, buffer: &mut String);

    /// Render the message into a new string
    fn formatted_message(&self) -> String {
        let mut buffer = String::new();
        self.format_to(&mut buffer);
        buffer
    }

    /// The unformatted pattern, if the message has one
    fn format(&self) -> Option<&str> {
        None
    }

    /// Structured parameters, in placeholder order
    fn parameters(&self) -> &[FieldValue] {
        &[]
    }
}

/// A pre-rendered message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimpleMessage {
    text: String,
}

impl SimpleMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Message for SimpleMessage {
    fn format_to(&self, buffer: &mut String) {
        buffer.push_str(&self.text);
    }

    fn formatted_message(&self) -> String {
        self.text.clone()
    }
}

impl From<&str> for SimpleMessage {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SimpleMessage {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A `{}`-placeholder pattern plus parameters, rendered on demand.
///
/// `\{` emits a literal `{` that does not start a placeholder and `\\` emits a
/// single backslash. Placeholders without a matching parameter are kept as
/// `{}`; surplus parameters are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterizedMessage {
    pattern: String,
    parameters: Vec<FieldValue>,
}

impl ParameterizedMessage {
    pub fn new(pattern: impl Into<String>, parameters: Vec<FieldValue>) -> Self {
        Self {
            pattern: pattern.into(),
            parameters,
        }
    }

    /// Add a parameter (builder style)
    #[must_use]
    pub fn with_param(mut self, value: impl Into<FieldValue>) -> Self {
        self.parameters.push(value.into());
        self
    }

    /// Number of `{}` placeholders in the pattern
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        let mut chars = self.pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    chars.next();
                }
                '{' if chars.peek() == Some(&'}') => {
                    chars.next();
                    count += 1;
                }
                _ => {}
            }
        }
        count
    }
}

impl Message for ParameterizedMessage {
    fn format_to(&self, buffer: &mut String) {
        use std::fmt::Write;

        let mut params = self.parameters.iter();
        let mut chars = self.pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.peek() {
                    Some('{') | Some('\\') => {
                        if let Some(escaped) = chars.next() {
                            buffer.push(escaped);
                        }
                    }
                    _ => buffer.push('\\'),
                },
                '{' if chars.peek() == Some(&'}') => {
                    chars.next();
                    match params.next() {
                        // Writing into a String cannot fail
                        Some(value) => {
                            let _ = write!(buffer, "{}", value);
                        }
                        None => buffer.push_str("{}"),
                    }
                }
                _ => buffer.push(c),
            }
        }
    }

    fn format(&self) -> Option<&str> {
        Some(&self.pattern)
    }

    fn parameters(&self) -> &[FieldValue] {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_message() {
        let msg = SimpleMessage::new("hello");
        assert_eq!(msg.formatted_message(), "hello");
        assert!(msg.format().is_none());
        assert!(msg.parameters().is_empty());
    }

    #[test]
    fn test_parameterized_substitution() {
        let msg = ParameterizedMessage::new("user {} logged in from {}", vec![])
            .with_param("alice")
            .with_param(42);
        assert_eq!(msg.formatted_message(), "user alice logged in from 42");
        assert_eq!(msg.format(), Some("user {} logged in from {}"));
        assert_eq!(msg.parameters().len(), 2);
    }

    #[test]
    fn test_parameterized_missing_and_surplus() {
        let msg = ParameterizedMessage::new("{} and {}", vec![FieldValue::Bool(true)]);
        assert_eq!(msg.formatted_message(), "true and {}");

        let msg = ParameterizedMessage::new("only {}", vec![1.into(), 2.into()]);
        assert_eq!(msg.formatted_message(), "only 1");
    }

    #[test]
    fn test_parameterized_escapes() {
        let msg = ParameterizedMessage::new("literal \\{} then {}", vec![7.into()]);
        assert_eq!(msg.formatted_message(), "literal {} then 7");
        assert_eq!(msg.placeholder_count(), 1);

        let msg = ParameterizedMessage::new("path C:\\\\{}", vec!["dir".into()]);
        assert_eq!(msg.formatted_message(), "path C:\\dir");
    }

    #[test]
    fn test_field_value_option() {
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some("x")), FieldValue::String("x".into()));
    }
}
