//! Criterion benchmarks for rust_kafka_logger

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_kafka_logger::broker::{KeyPolicy, ProducerMessage};
use rust_kafka_logger::prelude::*;
use serde_json::json;
use std::io;
use std::sync::Arc;

fn null_console(format: OutputFormat) -> ConsoleSink {
    ConsoleSink::with_writer(io::sink()).with_formatter(Formatter::new(format))
}

/// Producer over a client whose queue is drained by a background thread
fn draining_producer(envelope: Option<EnvelopeConfig>) -> BrokerProducer {
    let (client, broker) = ChannelClient::bounded(4096);
    std::thread::spawn(move || for _message in broker.iter() {});
    BrokerProducer::with_client(ProducerConfig::default(), envelope, Box::new(client))
        .expect("producer")
}

// ============================================================================
// Logging Performance Benchmarks
// ============================================================================

fn bench_sync_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_logging");
    group.throughput(Throughput::Elements(1));

    for format in [OutputFormat::Text, OutputFormat::Json] {
        let logger = Logger::builder()
            .min_level(LogLevel::Trace)
            .sink(null_console(format))
            .build();

        group.bench_function(BenchmarkId::new("info", format!("{:?}", format)), |b| {
            b.iter(|| logger.info(black_box("Info message")));
        });
    }

    group.finish();
}

fn bench_async_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("async_logging");
    group.throughput(Throughput::Elements(1));

    let logger = Logger::builder()
        .async_mode(10000)
        .overflow_policy(OverflowPolicy::DropNewest)
        .sink(null_console(OutputFormat::Json))
        .build();

    group.bench_function("info", |b| {
        b.iter(|| logger.info(black_box("Info message")));
    });

    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    group.throughput(Throughput::Elements(1));

    let logger = Logger::builder()
        .sink(null_console(OutputFormat::Text))
        .sink(null_console(OutputFormat::Json))
        .broker(
            Arc::new(draining_producer(Some(EnvelopeConfig::default()))),
            BrokerMode::Hook,
        )
        .build();

    group.bench_function("console_json_broker", |b| {
        b.iter(|| logger.info(black_box("Fan-out message")));
    });

    let scope = logger.with_fields(
        LogContext::new()
            .with_field("request_id", "r-1")
            .with_field("user_id", 42),
    );
    group.bench_function("with_fields", |b| {
        b.iter(|| scope.info(black_box("Scoped message")));
    });

    group.finish();
}

fn bench_concurrent_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_logging");

    let logger = Arc::new(
        Logger::builder()
            .async_mode(10000)
            .overflow_policy(OverflowPolicy::DropNewest)
            .sink(null_console(OutputFormat::Text))
            .build(),
    );

    group.bench_function("multi_thread_4", |b| {
        let logger = Arc::clone(&logger);
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let logger = Arc::clone(&logger);
                    std::thread::spawn(move || {
                        for _ in 0..100 {
                            logger.info(black_box("Concurrent message"));
                        }
                    })
                })
                .collect();
            for handle in handles {
                let _ = handle.join();
            }
        });
    });

    group.finish();
}

// ============================================================================
// Broker Pipeline Benchmarks
// ============================================================================

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("broker_pipeline");
    group.throughput(Throughput::Elements(1));

    let payload = serde_json::to_vec(&json!({
        "data": "user logged in",
        "subject": "info",
        "time": "2025-01-08T10:30:45Z",
        "user_id": 42,
    }))
    .unwrap_or_default();

    let plain = draining_producer(None);
    group.bench_function("prepare_no_envelope", |b| {
        b.iter(|| -> Option<ProducerMessage> { plain.prepare(black_box(&payload)).ok() });
    });

    for strategy in [IdStrategy::Hmac, IdStrategy::Uuid, IdStrategy::Incremental] {
        let producer = draining_producer(Some(EnvelopeConfig {
            id_strategy: strategy,
            ..EnvelopeConfig::default()
        }));
        group.bench_function(BenchmarkId::new("prepare", format!("{:?}", strategy)), |b| {
            b.iter(|| producer.prepare(black_box(&payload)).ok());
        });
    }

    group.finish();
}

fn bench_key_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_derivation");

    let template = match json!({"data": "x", "subject": "warning", "tenant": "acme"}) {
        serde_json::Value::Object(map) => map,
        _ => Record::new(),
    };

    for strategy in [
        KeyStrategy::Fixed,
        KeyStrategy::Level,
        KeyStrategy::Extracted,
        KeyStrategy::Nanosecond,
    ] {
        let policy = KeyPolicy {
            strategy,
            key_name: "tenant",
            level_field: "subject",
            key_fn: None,
        };
        group.bench_function(strategy.as_str(), |b| {
            b.iter(|| {
                let mut record = template.clone();
                policy.derive(black_box(&mut record)).ok()
            });
        });
    }

    group.finish();
}

// ============================================================================
// Entry and Formatting Benchmarks
// ============================================================================

fn bench_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatting");

    let entry = LogEntry::new(LogLevel::Info, "Request processed").with_fields(
        LogContext::new()
            .with_field("status", 200)
            .with_field("path", "/api/orders"),
    );

    for (name, formatter) in [
        ("text", Formatter::new(OutputFormat::Text)),
        ("text_colored", Formatter::new(OutputFormat::Text).with_colors(true)),
        ("json", Formatter::new(OutputFormat::Json)),
        ("cloudevents", Formatter::new(OutputFormat::CloudEvents)),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| formatter.render(black_box(&entry)).ok());
        });
    }

    group.bench_function("entry_sanitized", |b| {
        b.iter(|| LogEntry::new(LogLevel::Info, black_box("line one\nline two\ttabbed")));
    });

    group.finish();
}

fn bench_level_filtering(c: &mut Criterion) {
    let mut group = c.benchmark_group("level_filtering");

    let logger = Logger::builder()
        .min_level(LogLevel::Error)
        .sink(null_console(OutputFormat::Text))
        .build();

    group.bench_function("filtered_out", |b| {
        b.iter(|| logger.debug(black_box("Filtered message")));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_sync_logging,
    bench_async_logging,
    bench_fan_out,
    bench_concurrent_logging,
    bench_pipeline,
    bench_key_derivation,
    bench_formatting,
    bench_level_filtering,
);
criterion_main!(benches);
