//! Channel sink: hands event mementos to another thread

use crate::core::{ImmutableLogEvent, LogEvent, LoggerError, Result, Sink};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};

/// Forwards an owned copy of each event over a crossbeam channel.
///
/// Useful for bridging into another logging system and for tests. A bounded
/// channel that is full reports a sink error rather than blocking the
/// consumer thread.
pub struct ChannelSink {
    sender: Sender<ImmutableLogEvent>,
    name: String,
}

impl ChannelSink {
    /// A sink backed by an unbounded channel, and its receiving end
    pub fn unbounded() -> (Self, Receiver<ImmutableLogEvent>) {
        let (sender, receiver) = unbounded();
        (Self::from_sender(sender), receiver)
    }

    /// A sink backed by a channel holding at most `capacity` events
    pub fn bounded(capacity: usize) -> (Self, Receiver<ImmutableLogEvent>) {
        let (sender, receiver) = bounded(capacity);
        (Self::from_sender(sender), receiver)
    }

    pub fn from_sender(sender: Sender<ImmutableLogEvent>) -> Self {
        Self {
            sender,
            name: "channel".to_string(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Sink for ChannelSink {
    fn log(&self, event: &dyn LogEvent) -> Result<()> {
        match self.sender.try_send(event.to_immutable()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(LoggerError::sink(&self.name, "channel is full")),
            Err(TrySendError::Disconnected(_)) => Err(LoggerError::sink(&self.name, "receiver was dropped")),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
