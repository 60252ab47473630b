//! JSON lines sink for structured logging

use crate::core::{LogEvent, LoggerError, Result, Sink};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes each event as a single-line JSON object (JSONL format).
///
/// The object is the serialized [`ImmutableLogEvent`](crate::core::ImmutableLogEvent)
/// form of the event; empty optional fields are omitted. Compatible with log
/// aggregation tools like ELK, Loki, etc.
pub struct JsonSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| LoggerError::io_operation("opening JSON log file", path.display().to_string(), e))?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl Sink for JsonSink {
    fn log(&self, event: &dyn LogEvent) -> Result<()> {
        let json = serde_json::to_string(&event.to_immutable())?;

        let mut writer = self.writer.lock();
        writeln!(writer, "{}", json)?;
        if event.is_end_of_batch() {
            writer.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "json"
    }
}

impl Drop for JsonSink {
    fn drop(&mut self) {
        let _ = self.writer.get_mut().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ImmutableLogEvent, LogLevel, Marker};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_writes_one_object_per_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("events.jsonl");
        let sink = JsonSink::new(&path).unwrap();

        sink.log(&ImmutableLogEvent::new("app", LogLevel::Info, "first")).unwrap();
        sink.log(
            &ImmutableLogEvent::new("app", LogLevel::Error, "second\nline").with_marker(Marker::new("AUDIT")),
        )
        .unwrap();
        sink.flush().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["level"], "INFO");
        assert_eq!(lines[0]["message"], "first");
        assert!(lines[0].get("marker").is_none());
        assert_eq!(lines[1]["message"], "second\nline");
        assert_eq!(lines[1]["marker"], "AUDIT");
    }
}
