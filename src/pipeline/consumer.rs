//! Background consumer: drains the ring buffer into the sinks
//!
//! One consumer thread runs per pipeline. Each published slot is handed to
//! every sink in turn; a sink that fails or panics is reported through the
//! status logger and the remaining sinks still receive the event. The
//! [`Dispatcher`] is shared with producers that deliver synchronously when the
//! queue is full.

use super::ring_buffer::{ClaimError, RingConsumer};
use super::ring_buffer_event::RingBufferLogEvent;
use crate::core::log_event::LogEvent;
use crate::core::metrics::PipelineMetrics;
use crate::core::overflow_policy::RecursionGuard;
use crate::core::sink::Sink;
use crate::core::status::StatusLogger;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Fans events out to the configured sinks with per-sink failure isolation
pub struct Dispatcher {
    sinks: Vec<Arc<dyn Sink>>,
    metrics: Arc<PipelineMetrics>,
    status: Arc<StatusLogger>,
}

impl Dispatcher {
    pub fn new(sinks: Vec<Arc<dyn Sink>>, metrics: Arc<PipelineMetrics>, status: Arc<StatusLogger>) -> Self {
        Self { sinks, metrics, status }
    }

    pub fn sinks(&self) -> &[Arc<dyn Sink>] {
        &self.sinks
    }

    /// Deliver one event to every sink.
    ///
    /// Returns the number of sinks that failed. The event counts as delivered
    /// if at least one sink accepted it; an event every sink rejected is lost.
    pub fn deliver(&self, event: &dyn LogEvent) -> usize {
        // A sink that logs re-enters the producer path one level deeper
        let _guard = RecursionGuard::enter();
        let mut failures = 0;

        for sink in &self.sinks {
            match catch_unwind(AssertUnwindSafe(|| sink.log(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    self.metrics.record_sink_failure();
                    self.status
                        .error(format!("Sink '{}' failed to handle event: {}", sink.name(), e));
                }
                Err(panic_info) => {
                    failures += 1;
                    self.metrics.record_sink_failure();
                    self.status.error(format!(
                        "Sink '{}' panicked: {}. Other sinks continue to function.",
                        sink.name(),
                        panic_message(&*panic_info)
                    ));
                }
            }
        }

        if self.sinks.is_empty() || failures < self.sinks.len() {
            self.metrics.record_delivered();
        }
        failures
    }

    /// Flush every sink, reporting failures without stopping
    pub fn flush_all(&self) {
        let _guard = RecursionGuard::enter();
        for sink in &self.sinks {
            match catch_unwind(AssertUnwindSafe(|| sink.flush())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.status.error(format!("Sink '{}' flush failed: {}", sink.name(), e));
                }
                Err(panic_info) => {
                    self.status.error(format!(
                        "Sink '{}' panicked during flush: {}",
                        sink.name(),
                        panic_message(&*panic_info)
                    ));
                }
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("Dispatcher").field("sinks", &names).finish()
    }
}

/// Consumer loop body, run on the dedicated consumer thread.
///
/// `in_flight` holds the sequence of the event currently (or most recently)
/// handed to the sinks. An event claimed after the ring was halted is never
/// delivered, so shutdown can count exactly what was abandoned.
pub(crate) fn run_consumer(
    mut consumer: RingConsumer<RingBufferLogEvent>,
    dispatcher: Arc<Dispatcher>,
    in_flight: Arc<AtomicI64>,
) {
    let ring = Arc::clone(consumer.ring());
    loop {
        let mut slot = match consumer.claim_next(None) {
            Ok(slot) => slot,
            Err(ClaimError::TimedOut) => continue,
            Err(ClaimError::Halted) => break,
        };

        if ring.is_halted() {
            break;
        }
        in_flight.store(slot.sequence(), Ordering::SeqCst);

        if !slot.is_populated() {
            // The producer's translation panicked; nothing to deliver
            continue;
        }

        let end_of_batch = slot.is_end_of_batch();
        slot.set_end_of_batch(end_of_batch);
        slot.render_message();
        dispatcher.deliver(&*slot);
    }

    dispatcher.flush_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{LoggerError, Result};
    use crate::core::log_event::ImmutableLogEvent;
    use crate::core::log_level::LogLevel;
    use crate::pipeline::ring_buffer::RingBuffer;
    use crate::pipeline::wait_strategy::WaitStrategy;
    use parking_lot::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    struct Collecting {
        seen: Mutex<Vec<(String, bool)>>,
    }

    impl Sink for Collecting {
        fn log(&self, event: &dyn LogEvent) -> Result<()> {
            self.seen
                .lock()
                .push((event.formatted_message().into_owned(), event.is_end_of_batch()));
            Ok(())
        }

        fn name(&self) -> &str {
            "collecting"
        }
    }

    struct Failing;

    impl Sink for Failing {
        fn log(&self, _event: &dyn LogEvent) -> Result<()> {
            Err(LoggerError::sink("failing", "disk on fire"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct Panicking;

    impl Sink for Panicking {
        fn log(&self, _event: &dyn LogEvent) -> Result<()> {
            panic!("sink exploded");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    fn quiet_status() -> Arc<StatusLogger> {
        let status = Arc::new(StatusLogger::new());
        status.set_listener_level(LogLevel::Off);
        status
    }

    #[test]
    fn test_failing_sinks_do_not_block_others() {
        let collecting = Arc::new(Collecting {
            seen: Mutex::new(Vec::new()),
        });
        let metrics = Arc::new(PipelineMetrics::new());
        let status = quiet_status();
        let sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(Failing), Arc::new(Panicking), collecting.clone()];
        let dispatcher = Dispatcher::new(
            sinks,
            Arc::clone(&metrics),
            Arc::clone(&status),
        );

        let event = ImmutableLogEvent::new("test", LogLevel::Info, "still delivered");
        assert_eq!(dispatcher.deliver(&event), 2);

        assert_eq!(collecting.seen.lock().len(), 1);
        assert_eq!(metrics.sink_failure_count(), 2);
        assert_eq!(metrics.delivered_count(), 1);
        assert!(status.contains("disk on fire"));
        assert!(status.contains("sink exploded"));
    }

    #[test]
    fn test_event_rejected_by_every_sink_is_not_delivered() {
        let metrics = Arc::new(PipelineMetrics::new());
        let sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(Failing), Arc::new(Panicking)];
        let dispatcher = Dispatcher::new(sinks, Arc::clone(&metrics), quiet_status());

        let event = ImmutableLogEvent::new("test", LogLevel::Error, "nowhere to go");
        assert_eq!(dispatcher.deliver(&event), 2);

        assert_eq!(metrics.delivered_count(), 0);
        assert_eq!(metrics.sink_failure_count(), 2);
    }

    #[test]
    fn test_consumer_drains_in_order_and_marks_batch_end() {
        let ring = Arc::new(RingBuffer::<RingBufferLogEvent>::new(16, WaitStrategy::default()).unwrap());
        let consumer = ring.consumer().unwrap();
        let collecting = Arc::new(Collecting {
            seen: Mutex::new(Vec::new()),
        });
        let dispatcher = Arc::new(Dispatcher::new(
            vec![collecting.clone() as Arc<dyn Sink>],
            Arc::new(PipelineMetrics::new()),
            quiet_status(),
        ));

        for i in 0..5 {
            let event = ImmutableLogEvent::new("test", LogLevel::Info, format!("event {}", i));
            assert!(ring.try_publish_with(|slot, seq| slot.init_from(&event, seq)));
        }

        let in_flight = Arc::new(AtomicI64::new(-1));
        let worker = {
            let in_flight = Arc::clone(&in_flight);
            thread::spawn(move || run_consumer(consumer, dispatcher, in_flight))
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while collecting.seen.lock().len() < 5 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        ring.halt();
        worker.join().unwrap();

        let seen = collecting.seen.lock();
        let messages: Vec<&str> = seen.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(messages, vec!["event 0", "event 1", "event 2", "event 3", "event 4"]);
        assert!(seen[4].1, "last event of the run ends the batch");
        assert_eq!(in_flight.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_unpopulated_slot_is_skipped() {
        let ring = Arc::new(RingBuffer::<RingBufferLogEvent>::new(8, WaitStrategy::Yield).unwrap());
        let consumer = ring.consumer().unwrap();
        let collecting = Arc::new(Collecting {
            seen: Mutex::new(Vec::new()),
        });
        let dispatcher = Arc::new(Dispatcher::new(
            vec![collecting.clone() as Arc<dyn Sink>],
            Arc::new(PipelineMetrics::new()),
            quiet_status(),
        ));

        let published = catch_unwind(AssertUnwindSafe(|| {
            ring.try_publish_with(|_, _| panic!("translation failed"))
        }));
        assert!(published.is_err());
        let event = ImmutableLogEvent::new("test", LogLevel::Info, "after");
        assert!(ring.try_publish_with(|slot, seq| slot.init_from(&event, seq)));

        let in_flight = Arc::new(AtomicI64::new(-1));
        let worker = {
            let in_flight = Arc::clone(&in_flight);
            thread::spawn(move || run_consumer(consumer, dispatcher, in_flight))
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while in_flight.load(Ordering::SeqCst) < 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        ring.halt();
        worker.join().unwrap();

        let seen = collecting.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "after");
    }
}
