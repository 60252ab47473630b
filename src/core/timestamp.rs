//! Timestamp formatting utilities
//!
//! Renders [`EventInstant`] values for sink output. Supports ISO 8601,
//! RFC 3339, Unix timestamps, and custom strftime formats.

use super::clock::EventInstant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standardized timestamp format options
///
/// # Examples
///
/// ```
/// use rust_async_logger::core::{EventInstant, TimestampFormat};
///
/// let format = TimestampFormat::Iso8601;
/// let text = format.format_instant(&EventInstant::from_epoch_millis(0));
/// assert_eq!(text, "1970-01-01T00:00:00.000Z");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// ISO 8601 with microseconds: `2025-01-08T10:30:45.123456Z`
    Iso8601Micros,

    /// ISO 8601 with nanoseconds: `2025-01-08T10:30:45.123456789Z`
    Iso8601Nanos,

    /// RFC 3339 format: `2025-01-08T10:30:45+00:00`
    Rfc3339,

    /// Unix timestamp in seconds: `1736332245`
    Unix,

    /// Unix timestamp in milliseconds: `1736332245123`
    UnixMillis,

    /// Custom strftime format
    Custom(String),
}

impl TimestampFormat {
    /// Format a `DateTime<Utc>` according to this format
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            TimestampFormat::Iso8601Micros => datetime.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            TimestampFormat::Iso8601Nanos => datetime.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string(),
            TimestampFormat::Rfc3339 => datetime.to_rfc3339(),
            TimestampFormat::Unix => datetime.timestamp().to_string(),
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::Custom(format_str) => datetime.format(format_str).to_string(),
        }
    }

    /// Format an event instant according to this format
    #[must_use]
    pub fn format_instant(&self, instant: &EventInstant) -> String {
        match self {
            TimestampFormat::Unix => instant.epoch_second().to_string(),
            TimestampFormat::UnixMillis => instant.epoch_millis().to_string(),
            _ => self.format(&instant.to_datetime()),
        }
    }

    /// Check if this is a Unix-based numeric format
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, TimestampFormat::Unix | TimestampFormat::UnixMillis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_instant() -> EventInstant {
        // 2025-01-08 10:30:45.123456789 UTC
        EventInstant::new(1_736_332_245, 123_456_789)
    }

    #[test]
    fn test_iso8601_format() {
        let result = TimestampFormat::Iso8601.format_instant(&fixed_instant());
        assert_eq!(result, "2025-01-08T10:30:45.123Z");
    }

    #[test]
    fn test_iso8601_micros_and_nanos() {
        assert_eq!(
            TimestampFormat::Iso8601Micros.format_instant(&fixed_instant()),
            "2025-01-08T10:30:45.123456Z"
        );
        assert_eq!(
            TimestampFormat::Iso8601Nanos.format_instant(&fixed_instant()),
            "2025-01-08T10:30:45.123456789Z"
        );
    }

    #[test]
    fn test_unix_formats() {
        assert_eq!(
            TimestampFormat::Unix.format_instant(&fixed_instant()),
            "1736332245"
        );
        assert_eq!(
            TimestampFormat::UnixMillis.format_instant(&fixed_instant()),
            "1736332245123"
        );
    }

    #[test]
    fn test_custom_format() {
        let format = TimestampFormat::Custom("%Y/%m/%d %H:%M".to_string());
        assert_eq!(format.format_instant(&fixed_instant()), "2025/01/08 10:30");
    }

    #[test]
    fn test_is_numeric() {
        assert!(!TimestampFormat::Iso8601.is_numeric());
        assert!(TimestampFormat::Unix.is_numeric());
        assert!(TimestampFormat::UnixMillis.is_numeric());
    }

    #[test]
    fn test_serde_roundtrip() {
        let format: TimestampFormat =
            serde_json::from_str(r#"{"Custom":"%Y-%m-%d"}"#).expect("deserialize Custom");
        assert_eq!(format, TimestampFormat::Custom("%Y-%m-%d".to_string()));
        assert_eq!(
            serde_json::to_string(&TimestampFormat::Iso8601).expect("serialize"),
            "\"Iso8601\""
        );
    }
}
