//! Pipeline lifecycle: start the consumer thread, drain and halt on stop
//!
//! States move `Stopped -> Starting -> Started -> Stopping -> Stopped`. While
//! started, producers obtain the shared [`RunningPipeline`] and publish into
//! its ring buffer. `stop` first detaches the running pipeline so new calls
//! fail fast, then lets the consumer drain until the deadline, then halts it.

use super::consumer::{run_consumer, Dispatcher};
use super::ring_buffer::RingBuffer;
use super::ring_buffer_event::RingBufferLogEvent;
use super::translator::EventTranslator;
use crate::core::config::AsyncConfig;
use crate::core::error::{LoggerError, Result};
use crate::core::log_event::LogEvent;
use crate::core::metrics::PipelineMetrics;
use crate::core::status::StatusLogger;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Upper bound on one sleep while waiting for the drain
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Extra time given to the consumer thread to exit after a clean drain
const EXIT_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Started,
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Stopped => "STOPPED",
            LifecycleState::Starting => "STARTING",
            LifecycleState::Started => "STARTED",
            LifecycleState::Stopping => "STOPPING",
        };
        f.write_str(name)
    }
}

/// Outcome of [`Pipeline::stop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    /// Events handed to the sinks between the stop request and the halt
    pub drained: u64,
    /// Published events that were never delivered
    pub abandoned: u64,
    /// Events discarded by the overflow policy over the pipeline's life
    pub discarded: u64,
    pub elapsed: Duration,
    /// The drain did not finish before the deadline
    pub timed_out: bool,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        !self.timed_out && self.abandoned == 0
    }
}

/// A started pipeline: ring buffer plus its consumer thread
pub struct RunningPipeline {
    ring: Arc<RingBuffer<RingBufferLogEvent>>,
    consumer_thread: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
    in_flight: Arc<AtomicI64>,
    enqueue_lock: Mutex<()>,
}

impl RunningPipeline {
    pub fn ring(&self) -> &RingBuffer<RingBufferLogEvent> {
        &self.ring
    }

    pub fn is_halted(&self) -> bool {
        self.ring.is_halted()
    }

    /// True when called from this pipeline's consumer thread
    pub fn is_consumer_thread(&self) -> bool {
        thread::current().id() == self.consumer_thread
    }

    pub fn try_publish(&self, translator: &mut EventTranslator) -> bool {
        self.ring
            .try_publish_with(|slot, sequence| translator.translate_to(slot, sequence))
    }

    /// Wait for a free slot and publish.
    ///
    /// With `synchronize` set, blocked producers take turns so they publish
    /// in the order they started waiting. Never call this from the consumer
    /// thread.
    pub fn enqueue(&self, translator: &mut EventTranslator, synchronize: bool) -> bool {
        let publish = |translator: &mut EventTranslator| {
            self.ring
                .publish_with(|slot, sequence| translator.translate_to(slot, sequence))
        };
        if synchronize {
            let _turn = self.enqueue_lock.lock();
            publish(translator)
        } else {
            publish(translator)
        }
    }

    pub fn try_publish_event(&self, event: &dyn LogEvent) -> bool {
        self.ring.try_publish_with(|slot, sequence| slot.init_from(event, sequence))
    }

    pub fn enqueue_event(&self, event: &dyn LogEvent, synchronize: bool) -> bool {
        let publish = || self.ring.publish_with(|slot, sequence| slot.init_from(event, sequence));
        if synchronize {
            let _turn = self.enqueue_lock.lock();
            publish()
        } else {
            publish()
        }
    }

    fn delivered_through(&self) -> i64 {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for RunningPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningPipeline")
            .field("ring", &self.ring)
            .field("consumer_thread", &self.consumer_thread)
            .field("in_flight", &self.delivered_through())
            .finish()
    }
}

/// Owns the running state of one pipeline
pub struct Pipeline {
    config: AsyncConfig,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<PipelineMetrics>,
    status: Arc<StatusLogger>,
    state: Mutex<LifecycleState>,
    running: RwLock<Option<Arc<RunningPipeline>>>,
}

impl Pipeline {
    pub fn new(
        config: AsyncConfig,
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<PipelineMetrics>,
        status: Arc<StatusLogger>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            metrics,
            status,
            state: Mutex::new(LifecycleState::Stopped),
            running: RwLock::new(None),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub fn is_started(&self) -> bool {
        self.state() == LifecycleState::Started
    }

    /// The running pipeline, or `None` when not started
    pub fn running(&self) -> Option<Arc<RunningPipeline>> {
        self.running.read().clone()
    }

    /// Free slots right now; a heuristic only
    pub fn remaining_capacity(&self) -> Option<usize> {
        self.running().map(|running| running.ring.remaining_capacity())
    }

    /// Allocate the ring buffer and spawn the consumer thread.
    ///
    /// Calling `start` on a started pipeline is a no-op. Concurrent callers
    /// serialize on the state lock, so only one of them starts the thread.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            LifecycleState::Started => return Ok(()),
            LifecycleState::Stopped => {}
            other => {
                return Err(LoggerError::other(format!("cannot start pipeline while {}", other)));
            }
        }
        *state = LifecycleState::Starting;

        match self.spawn() {
            Ok(running) => {
                self.status.debug(format!(
                    "Started async pipeline '{}' with ring buffer size {} and {} wait strategy",
                    self.config.context_name,
                    running.ring.capacity(),
                    running.ring.wait_strategy()
                ));
                *self.running.write() = Some(running);
                *state = LifecycleState::Started;
                Ok(())
            }
            Err(e) => {
                *state = LifecycleState::Stopped;
                self.status.error(format!("Failed to start async pipeline: {}", e));
                Err(e)
            }
        }
    }

    fn spawn(&self) -> Result<Arc<RunningPipeline>> {
        self.config.validate()?;
        let capacity = self.config.ring_buffer_capacity();
        if capacity != self.config.ring_buffer_size {
            self.status.debug(format!(
                "Ring buffer size {} adjusted to {}",
                self.config.ring_buffer_size, capacity
            ));
        }
        let ring = Arc::new(RingBuffer::new(capacity, self.config.wait_strategy)?);
        let consumer = ring.consumer()?;
        let in_flight = Arc::new(AtomicI64::new(ring.consumed_sequence()));

        let name = self.config.thread_name();
        let handle = {
            let dispatcher = Arc::clone(&self.dispatcher);
            let in_flight = Arc::clone(&in_flight);
            thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_consumer(consumer, dispatcher, in_flight))
                .map_err(|e| LoggerError::thread_spawn(name, e))?
        };

        Ok(Arc::new(RunningPipeline {
            ring,
            consumer_thread: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
            in_flight,
            enqueue_lock: Mutex::new(()),
        }))
    }

    /// Stop accepting events, drain for up to `timeout`, then halt.
    ///
    /// Returns promptly when the pipeline is not started. Events still queued
    /// at the deadline are abandoned and counted.
    pub fn stop(&self, timeout: Duration) -> ShutdownReport {
        let started = Instant::now();
        let running = {
            let mut state = self.state.lock();
            if *state != LifecycleState::Started {
                return ShutdownReport {
                    discarded: self.metrics.discarded_count(),
                    ..ShutdownReport::default()
                };
            }
            *state = LifecycleState::Stopping;
            self.running.write().take()
        };
        let Some(running) = running else {
            *self.state.lock() = LifecycleState::Stopped;
            return ShutdownReport::default();
        };

        let deadline = started + timeout;
        let delivered_at_start = running.delivered_through();

        while running.ring.has_backlog() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(DRAIN_POLL_INTERVAL.min(deadline - now));
        }

        running.ring.halt();
        let exit_deadline = deadline.max(Instant::now() + EXIT_GRACE);
        let timed_out = !self.wait_for_exit(&running, exit_deadline);
        // A producer that fetched the pipeline before it was detached may
        // still claim a slot after the halt; the cursor is final once they leave
        let quiesced = Self::wait_for_producers(&running, exit_deadline);
        if !quiesced {
            self.status.warn(format!(
                "Producers were still publishing to async pipeline '{}' at shutdown; the abandoned count may be low",
                self.config.context_name
            ));
        }

        let delivered_through = running.delivered_through();
        let abandoned = (running.ring.cursor() - delivered_through).max(0) as u64;
        let drained = (delivered_through - delivered_at_start).max(0) as u64;
        let discarded = self.metrics.discarded_count();

        if abandoned > 0 {
            self.metrics.record_abandoned(abandoned);
            self.status.warn(format!(
                "Async pipeline '{}' did not drain within {:?}; {} events abandoned",
                self.config.context_name, timeout, abandoned
            ));
        }
        if discarded > 0 {
            self.status.warn(format!(
                "Async pipeline '{}' discarded {} events because the queue was full",
                self.config.context_name, discarded
            ));
        }

        *self.state.lock() = LifecycleState::Stopped;
        let report = ShutdownReport {
            drained,
            abandoned,
            discarded,
            elapsed: started.elapsed(),
            timed_out: timed_out || abandoned > 0,
        };
        self.status.debug(format!(
            "Stopped async pipeline '{}': {:?}",
            self.config.context_name, report
        ));
        report
    }

    /// Wait until no producer holds `running` besides the caller
    fn wait_for_producers(running: &Arc<RunningPipeline>, deadline: Instant) -> bool {
        while Arc::strong_count(running) > 1 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Join the consumer if it exits before `deadline`. Returns false if the
    /// thread is still running (stuck in a sink) and was left detached.
    fn wait_for_exit(&self, running: &RunningPipeline, deadline: Instant) -> bool {
        let Some(handle) = running.handle.lock().take() else {
            return true;
        };

        loop {
            if handle.is_finished() {
                if handle.join().is_err() {
                    self.status.error("Async consumer thread panicked during shutdown");
                }
                return true;
            }
            if Instant::now() >= deadline {
                self.status.warn(
                    "Async consumer thread did not finish within timeout. \
                     It will exit once the current sink call returns.",
                );
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("context", &self.config.context_name)
            .field("state", &self.state())
            .finish()
    }
}
