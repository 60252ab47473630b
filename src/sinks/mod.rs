//! Sink implementations

pub mod channel;
pub mod json;
pub mod layout;

#[cfg(feature = "console")]
pub mod console;
#[cfg(feature = "file")]
pub mod file;

pub use channel::ChannelSink;
pub use json::JsonSink;
pub use layout::TextLayout;

#[cfg(feature = "console")]
pub use console::ConsoleSink;
#[cfg(feature = "file")]
pub use file::FileSink;

pub use crate::core::Sink;
