//! Structured capture of errors attached to events
//!
//! Errors are captured on the producer thread into an owned [`ThrownProxy`]
//! so the consumer never touches the caller's error value.

use serde::{Deserialize, Serialize};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

/// One frame of a captured stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub symbol: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl StackFrame {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            file: None,
            line: None,
        }
    }

    #[must_use]
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{} ({}:{})", self.symbol, file, line),
            (Some(file), None) => write!(f, "{} ({})", self.symbol, file),
            _ => write!(f, "{}", self.symbol),
        }
    }
}

/// An error captured as type name, message, stack frames and cause chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrownProxy {
    pub type_name: String,
    pub message: String,
    pub frames: Vec<StackFrame>,
    pub cause: Option<Box<ThrownProxy>>,
}

impl ThrownProxy {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            frames: Vec::new(),
            cause: None,
        }
    }

    /// Capture an error and its `source()` chain.
    ///
    /// The outer error keeps its concrete type name; causes are only known as
    /// trait objects and are recorded as `dyn Error`.
    pub fn from_error<E: Error + 'static>(error: &E) -> Self {
        let mut proxy = Self::new(std::any::type_name::<E>(), error.to_string());
        proxy.cause = error.source().map(|s| Box::new(Self::from_dyn(s)));
        proxy
    }

    fn from_dyn(error: &(dyn Error + 'static)) -> Self {
        let mut proxy = Self::new("dyn Error", error.to_string());
        proxy.cause = error.source().map(|s| Box::new(Self::from_dyn(s)));
        proxy
    }

    #[must_use]
    pub fn with_frames(mut self, frames: Vec<StackFrame>) -> Self {
        self.frames = frames;
        self
    }

    #[must_use]
    pub fn with_cause(mut self, cause: ThrownProxy) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Attach the current thread's stack, if backtraces can be captured
    #[must_use]
    pub fn with_current_backtrace(mut self) -> Self {
        let backtrace = Backtrace::force_capture();
        if backtrace.status() == BacktraceStatus::Captured {
            self.frames = parse_backtrace(&backtrace.to_string());
        }
        self
    }

    /// Iterate over this error and its causes, outermost first
    pub fn chain(&self) -> impl Iterator<Item = &ThrownProxy> {
        std::iter::successors(Some(self), |t| t.cause.as_deref())
    }
}

impl fmt::Display for ThrownProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, thrown) in self.chain().enumerate() {
            if depth > 0 {
                write!(f, "\nCaused by: ")?;
            }
            write!(f, "{}: {}", thrown.type_name, thrown.message)?;
            for frame in &thrown.frames {
                write!(f, "\n\tat {}", frame)?;
            }
        }
        Ok(())
    }
}

/// Parse the `Display` output of a std backtrace into frames.
///
/// Frame lines look like `  3: symbol` and may be followed by a
/// `at path/file.rs:12:5` line.
pub fn parse_backtrace(text: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(location) = trimmed.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                let mut parts = location.rsplitn(3, ':');
                let _column = parts.next();
                let line_no = parts.next().and_then(|l| l.parse().ok());
                match (parts.next(), line_no) {
                    (Some(file), Some(line_no)) => {
                        frame.file = Some(file.to_string());
                        frame.line = Some(line_no);
                    }
                    _ => frame.file = Some(location.to_string()),
                }
            }
        } else if let Some((index, symbol)) = trimmed.split_once(": ") {
            if index.chars().all(|c| c.is_ascii_digit()) && !index.is_empty() {
                frames.push(StackFrame::new(symbol));
            }
        }
    }
    frames
}
