//! File sink

use super::layout::TextLayout;
use crate::core::{LogEvent, LoggerError, Result, Sink, TimestampFormat};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends text lines to a file.
///
/// Output is buffered and flushed at the end of each batch the consumer
/// drains, so a burst of events costs one write. With locking enabled the
/// flush holds an exclusive advisory lock, letting several processes append
/// to the same file without interleaving partial batches.
pub struct FileSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    layout: TextLayout,
    lock_on_flush: bool,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LoggerError::io_operation("opening log file", path.display().to_string(), e))?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
            layout: TextLayout::new(),
            lock_on_flush: false,
        })
    }

    /// Set the timestamp format for this sink
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rust_async_logger::sinks::FileSink;
    /// use rust_async_logger::TimestampFormat;
    ///
    /// let sink = FileSink::new("/var/log/app.log")
    ///     .unwrap()
    ///     .with_timestamp_format(TimestampFormat::Rfc3339);
    /// ```
    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.layout = std::mem::take(&mut self.layout).with_timestamp_format(format);
        self
    }

    /// Set a custom timestamp format using a strftime-compatible format string
    #[must_use]
    pub fn with_custom_timestamp(mut self, format_str: &str) -> Self {
        self.layout = std::mem::take(&mut self.layout).with_custom_timestamp(format_str);
        self
    }

    /// Take an exclusive file lock while flushing
    #[must_use]
    pub fn with_locking(mut self, enabled: bool) -> Self {
        self.lock_on_flush = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush_writer(&self, writer: &mut BufWriter<File>) -> Result<()> {
        if !self.lock_on_flush {
            writer.flush()?;
            return Ok(());
        }

        writer.get_ref().lock_exclusive()?;
        let flushed = writer.flush();
        let unlocked = FileExt::unlock(writer.get_ref());
        flushed?;
        unlocked?;
        Ok(())
    }
}

impl Sink for FileSink {
    fn log(&self, event: &dyn LogEvent) -> Result<()> {
        let mut output = self.layout.format(event);
        output.push('\n');

        let mut writer = self.writer.lock();
        writer.write_all(output.as_bytes())?;
        if event.is_end_of_batch() {
            self.flush_writer(&mut writer)?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        self.flush_writer(&mut writer)
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // Ensure all buffered data is flushed to disk
        let _ = self.flush();
    }
}
