//! Criterion benchmarks for rust_async_logger

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_async_logger::core::{LogEvent, StatusLogger};
use rust_async_logger::pipeline::{RingBuffer, SlotEvent};
use rust_async_logger::prelude::*;
use rust_async_logger::sinks::TextLayout;
use std::sync::Arc;
use std::time::Duration;

struct NullSink;

impl Sink for NullSink {
    fn log(&self, event: &dyn LogEvent) -> Result<()> {
        black_box(event.level());
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

fn quiet_status() -> Arc<StatusLogger> {
    let status = Arc::new(StatusLogger::new());
    status.set_listener_level(LogLevel::Off);
    status
}

fn context(policy: QueueFullPolicy, min_level: LogLevel) -> LoggerContext {
    LoggerContext::builder()
        .config(
            AsyncConfig::builder()
                .ring_buffer_size(65_536)
                .queue_full_policy(policy)
                .build(),
        )
        .min_level(min_level)
        .sink(NullSink)
        .status_logger(quiet_status())
        .build()
        .expect("benchmark context")
}

// ============================================================================
// Lifecycle Benchmarks
// ============================================================================

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");
    group.throughput(Throughput::Elements(1));

    group.bench_function("start_stop", |b| {
        b.iter(|| {
            let context = LoggerContext::builder()
                .config(AsyncConfig::builder().ring_buffer_size(1024).build())
                .sink(NullSink)
                .status_logger(quiet_status())
                .build()
                .expect("benchmark context");
            black_box(context.stop(Duration::from_secs(1)))
        });
    });

    group.finish();
}

// ============================================================================
// Logging Performance Benchmarks
// ============================================================================

fn bench_async_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("async_logging");
    group.throughput(Throughput::Elements(1));

    let context = context(QueueFullPolicy::Enqueue, LogLevel::Trace);
    let logger = context.logger("bench");

    group.bench_function("info", |b| {
        b.iter(|| {
            logger.info(black_box("Info message"));
        });
    });

    group.bench_function("parameterized", |b| {
        b.iter(|| {
            logger.log_params(
                LogLevel::Info,
                black_box("user {} logged in from {}"),
                vec![FieldValue::from(42), FieldValue::from("10.0.0.1")],
            );
        });
    });

    group.bench_function("macro", |b| {
        b.iter(|| {
            rust_async_logger::info!(logger, "request {} took {}ms", black_box(7), black_box(12));
        });
    });

    group.bench_function("with_context", |b| {
        let _request = ThreadContext::put_scoped("request_id", "abc-123");
        b.iter(|| {
            logger.warn(black_box("Warning with context"));
        });
    });

    group.finish();
    context.stop(Duration::from_secs(5));
}

fn bench_overflow_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("overflow_policies");
    group.throughput(Throughput::Elements(1));

    let synchronous = context(QueueFullPolicy::Synchronous, LogLevel::Trace);
    let logger = synchronous.logger("synchronous");
    group.bench_function("synchronous", |b| {
        b.iter(|| {
            logger.info(black_box("Info message"));
        });
    });
    synchronous.stop(Duration::from_secs(5));

    let discard = context(QueueFullPolicy::Discard { threshold: LogLevel::Info }, LogLevel::Trace);
    let logger = discard.logger("discard");
    group.bench_function("discard", |b| {
        b.iter(|| {
            logger.debug(black_box("Debug message"));
        });
    });
    discard.stop(Duration::from_secs(5));

    group.finish();
}

// ============================================================================
// Concurrent Logging Benchmarks
// ============================================================================

fn bench_concurrent_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_logging");
    group.throughput(Throughput::Elements(4 * 1000));

    let context = context(QueueFullPolicy::Enqueue, LogLevel::Info);

    group.bench_function("multi_thread_4", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let logger = context.logger("concurrent");
                    std::thread::spawn(move || {
                        for _ in 0..1000 {
                            logger.info(black_box("Concurrent message"));
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.finish();
    context.stop(Duration::from_secs(5));
}

// ============================================================================
// Ring Buffer Benchmarks
// ============================================================================

#[derive(Default)]
struct Counter(u64);

impl SlotEvent for Counter {
    fn clear(&mut self) {
        self.0 = 0;
    }
}

fn bench_ring_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer");
    group.throughput(Throughput::Elements(1));

    let ring = Arc::new(RingBuffer::<Counter>::new(1024, WaitStrategy::Yield).unwrap());
    let mut consumer = ring.consumer().unwrap();

    group.bench_function("publish_claim", |b| {
        b.iter(|| {
            ring.try_publish_with(|slot, sequence| slot.0 = sequence as u64);
            let slot = consumer.claim_next(Some(Duration::from_millis(1))).unwrap();
            black_box(slot.0)
        });
    });

    group.finish();
}

// ============================================================================
// Filtering Benchmarks
// ============================================================================

fn bench_level_filtering(c: &mut Criterion) {
    let mut group = c.benchmark_group("level_filtering");
    group.throughput(Throughput::Elements(1));

    let context = context(QueueFullPolicy::Enqueue, LogLevel::Warn);
    let logger = context.logger("filter");

    group.bench_function("below_threshold", |b| {
        b.iter(|| {
            logger.debug(black_box("This should be filtered"));
        });
    });

    group.bench_function("below_threshold_macro", |b| {
        b.iter(|| {
            rust_async_logger::debug!(logger, "filtered {}", black_box(1));
        });
    });

    group.finish();
    context.stop(Duration::from_secs(5));
}

// ============================================================================
// Rendering Benchmarks
// ============================================================================

fn bench_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("rendering");
    group.throughput(Throughput::Elements(1));

    let event = ImmutableLogEvent::new("bench", LogLevel::Info, "Test message");
    let layout = TextLayout::new();

    group.bench_function("text_layout", |b| {
        b.iter(|| black_box(layout.format(&event)));
    });

    group.bench_function("to_json", |b| {
        b.iter(|| {
            let json = serde_json::to_string(&event).unwrap();
            black_box(json)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_lifecycle,
    bench_async_logging,
    bench_overflow_policies,
    bench_concurrent_logging,
    bench_ring_buffer,
    bench_level_filtering,
    bench_rendering,
);
criterion_main!(benches);
