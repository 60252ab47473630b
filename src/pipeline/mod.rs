//! Ring buffer pipeline: slots, translation, consumer and lifecycle

pub mod consumer;
pub mod lifecycle;
pub mod ring_buffer;
pub mod ring_buffer_event;
pub mod translator;
pub mod wait_strategy;

pub use consumer::Dispatcher;
pub use lifecycle::{LifecycleState, Pipeline, RunningPipeline, ShutdownReport};
pub use ring_buffer::{ClaimError, ClaimedSlot, RingBuffer, RingConsumer, SlotEvent};
pub use ring_buffer_event::{EventFields, RingBufferLogEvent, MAX_REUSABLE_MESSAGE_SIZE};
pub use translator::{EventTranslator, LogCall, TranslatorSettings};
pub use wait_strategy::WaitStrategy;
