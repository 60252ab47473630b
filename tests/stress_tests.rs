//! Stress tests for the async pipeline under contention
//!
//! These tests verify:
//! - Many producers on a small buffer lose nothing with blocking enqueue
//! - Per-producer order survives interleaving
//! - Discard accounting adds up under a flood
//! - A file sink keeps one line per event under concurrent load

use parking_lot::Mutex;
use rust_async_logger::core::{LogEvent, StatusLogger};
use rust_async_logger::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const PRODUCERS: usize = 8;

fn quiet_status() -> Arc<StatusLogger> {
    let status = Arc::new(StatusLogger::new());
    status.set_listener_level(LogLevel::Off);
    status
}

#[derive(Default)]
struct Collector {
    messages: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl Sink for Collector {
    fn log(&self, event: &dyn LogEvent) -> Result<()> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.messages.lock().push(event.formatted_message().into_owned());
        Ok(())
    }

    fn name(&self) -> &str {
        "collector"
    }
}

fn run_producers(context: &LoggerContext, per_thread: usize, level: LogLevel) {
    let handles: Vec<_> = (0..PRODUCERS)
        .map(|t| {
            let logger = context.logger(format!("producer-{}", t));
            thread::spawn(move || {
                for i in 0..per_thread {
                    logger.log(level, format!("{}:{}", t, i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("producer panicked");
    }
}

/// Blocking enqueue on a tiny buffer delivers everything, in per-thread order
#[test]
fn test_concurrent_enqueue_no_loss() {
    let collector = Arc::new(Collector::default());
    let context = LoggerContext::builder()
        .config(AsyncConfig::builder().ring_buffer_size(16).build())
        .shared_sink(collector.clone())
        .status_logger(quiet_status())
        .build()
        .unwrap();

    let per_thread = 2_000;
    run_producers(&context, per_thread, LogLevel::Info);
    let report = context.stop(Duration::from_secs(30));
    assert!(report.is_clean(), "unexpected loss: {:?}", report);

    let messages = collector.messages.lock();
    assert_eq!(messages.len(), PRODUCERS * per_thread);

    let mut next_expected: HashMap<usize, usize> = HashMap::new();
    for message in messages.iter() {
        let (thread_id, index) = message.split_once(':').unwrap();
        let thread_id: usize = thread_id.parse().unwrap();
        let index: usize = index.parse().unwrap();
        let expected = next_expected.entry(thread_id).or_insert(0);
        assert_eq!(index, *expected, "producer {} out of order", thread_id);
        *expected += 1;
    }

    assert_eq!(context.metrics().published_count(), (PRODUCERS * per_thread) as u64);
    assert_eq!(context.metrics().discarded_count(), 0);
}

/// Every low-severity event is either delivered or counted as discarded
#[test]
fn test_discard_flood_accounting() {
    let collector = Arc::new(Collector {
        delay: Some(Duration::from_micros(200)),
        ..Default::default()
    });
    let callback_total = Arc::new(AtomicU64::new(0));
    let callback_seen = callback_total.clone();

    let context = LoggerContext::builder()
        .config(
            AsyncConfig::builder()
                .ring_buffer_size(8)
                .queue_full_policy(QueueFullPolicy::Discard {
                    threshold: LogLevel::Info,
                })
                .build(),
        )
        .shared_sink(collector.clone())
        .status_logger(quiet_status())
        .on_discard(Arc::new(move |total| {
            callback_seen.store(total, Ordering::Relaxed);
        }))
        .build()
        .unwrap();

    let per_thread = 250;
    run_producers(&context, per_thread, LogLevel::Debug);
    context.stop(Duration::from_secs(30));

    let delivered = collector.messages.lock().len() as u64;
    let discarded = context.metrics().discarded_count();
    assert_eq!(delivered + discarded, (PRODUCERS * per_thread) as u64);
    assert!(discarded > 0, "a slow sink on an 8-slot buffer must overflow");
    assert!(callback_total.load(Ordering::Relaxed) >= 1);
}

/// Events above the discard threshold are never dropped
#[test]
fn test_discard_spares_severe_events() {
    let collector = Arc::new(Collector {
        delay: Some(Duration::from_micros(100)),
        ..Default::default()
    });
    let context = LoggerContext::builder()
        .config(
            AsyncConfig::builder()
                .ring_buffer_size(8)
                .queue_full_policy(QueueFullPolicy::Discard {
                    threshold: LogLevel::Info,
                })
                .build(),
        )
        .shared_sink(collector.clone())
        .status_logger(quiet_status())
        .build()
        .unwrap();

    let per_thread = 200;
    run_producers(&context, per_thread, LogLevel::Error);
    context.stop(Duration::from_secs(30));

    assert_eq!(collector.messages.lock().len(), PRODUCERS * per_thread);
    assert_eq!(context.metrics().discarded_count(), 0);
}

/// Synchronous overflow delivers everything even when most events bypass the queue
#[test]
fn test_synchronous_flood_delivers_all() {
    let collector = Arc::new(Collector::default());
    let context = LoggerContext::builder()
        .config(
            AsyncConfig::builder()
                .ring_buffer_size(8)
                .queue_full_policy(QueueFullPolicy::Synchronous)
                .build(),
        )
        .shared_sink(collector.clone())
        .status_logger(quiet_status())
        .build()
        .unwrap();

    let per_thread = 1_000;
    run_producers(&context, per_thread, LogLevel::Warn);
    context.stop(Duration::from_secs(30));

    let total = (PRODUCERS * per_thread) as u64;
    assert_eq!(collector.messages.lock().len() as u64, total);
    assert_eq!(
        context.metrics().published_count() + context.metrics().synchronous_count(),
        total
    );
}

/// Concurrent writers through a file sink produce exactly one line per event
#[test]
fn test_file_sink_under_load() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("stress.log");

    let sink = FileSink::new(&log_file).expect("Failed to create file sink");
    let context = LoggerContext::builder()
        .config(AsyncConfig::builder().ring_buffer_size(256).build())
        .sink(sink)
        .status_logger(quiet_status())
        .build()
        .unwrap();

    let per_thread = 500;
    run_producers(&context, per_thread, LogLevel::Info);
    context.stop(Duration::from_secs(30));
    drop(context);

    let content = std::fs::read_to_string(&log_file).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), PRODUCERS * per_thread);
    assert!(lines.iter().all(|line| line.contains("[INFO ]")));
    assert!(content.contains("producer-3"));
}
