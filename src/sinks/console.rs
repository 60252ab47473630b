//! Console sink

use super::layout::TextLayout;
use crate::core::{LogEvent, LogLevel, Result, Sink, TimestampFormat};
use colored::Colorize;
use std::io::Write;

/// Writes text lines to stdout, and `ERROR`/`FATAL` events to stderr
pub struct ConsoleSink {
    use_colors: bool,
    layout: TextLayout,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            layout: TextLayout::new(),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self {
            use_colors,
            layout: TextLayout::new(),
        }
    }

    /// Set the timestamp format for this sink
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_async_logger::sinks::ConsoleSink;
    /// use rust_async_logger::TimestampFormat;
    ///
    /// let sink = ConsoleSink::new()
    ///     .with_timestamp_format(TimestampFormat::Iso8601Micros);
    /// ```
    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.layout = self.layout.with_timestamp_format(format);
        self
    }

    fn render(&self, event: &dyn LogEvent) -> String {
        if self.use_colors {
            let level = format!("{:5}", event.level().to_str())
                .color(event.level().color_code())
                .to_string();
            self.layout.format_with_level(event, &level)
        } else {
            self.layout.format(event)
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn log(&self, event: &dyn LogEvent) -> Result<()> {
        let output = self.render(event);

        match event.level() {
            LogLevel::Error | LogLevel::Fatal => writeln!(std::io::stderr().lock(), "{}", output)?,
            _ => writeln!(std::io::stdout().lock(), "{}", output)?,
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        // Flush both stdout and stderr since we write to both
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
