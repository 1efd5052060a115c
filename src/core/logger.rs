//! Main logger implementation

use super::{
    error::{LoggerError, Result},
    log_context::{FieldValue, LogContext},
    log_entry::{LogEntry, Record},
    log_level::LogLevel,
    metrics::LoggerMetrics,
    overflow_policy::{OverflowCallback, OverflowPolicy},
    sink::Sink,
};
use crate::broker::{BrokerProducer, TOPIC_FIELD};
use crate::config::LoggerConfig;
use crate::sinks::{BrokerMode, BrokerSink};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default shutdown timeout for logger cleanup (5 seconds)
///
/// Used when the logger is dropped without an explicit
/// [`shutdown`](Logger::shutdown).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const BATCH_SIZE: usize = 50;

type SinkList = Arc<RwLock<Vec<Box<dyn Sink>>>>;

pub struct Logger {
    min_level: Arc<RwLock<LogLevel>>,
    sinks: SinkList,
    /// Fields stamped on every entry, such as the envelope's fixed fields
    base_fields: LogContext,
    sender: Option<Sender<LogEntry>>,
    worker: Option<thread::JoinHandle<()>>,
    metrics: Arc<LoggerMetrics>,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    broker: Option<Arc<BrokerProducer>>,
    closed: bool,
}

impl Logger {
    /// Synchronous logger with no sinks at `Info`
    #[must_use]
    pub fn new() -> Self {
        Self {
            min_level: Arc::new(RwLock::new(LogLevel::Info)),
            sinks: Arc::new(RwLock::new(Vec::new())),
            base_fields: LogContext::new(),
            sender: None,
            worker: None,
            metrics: Arc::new(LoggerMetrics::new()),
            overflow_policy: OverflowPolicy::default(),
            on_overflow: None,
            broker: None,
            closed: false,
        }
    }

    #[must_use]
    pub fn with_async(buffer_size: usize) -> Self {
        Self::with_async_config(buffer_size, OverflowPolicy::default(), None)
    }

    /// Async logger with a bounded queue of `buffer_size` entries
    ///
    /// Falls back to synchronous dispatch if the worker thread cannot be
    /// spawned.
    #[must_use]
    pub fn with_async_config(
        buffer_size: usize,
        overflow_policy: OverflowPolicy,
        on_overflow: Option<OverflowCallback>,
    ) -> Self {
        let mut logger = Self::new();
        logger.overflow_policy = overflow_policy;
        logger.on_overflow = on_overflow;

        let (sender, receiver) = bounded(buffer_size.max(1));
        let sinks = Arc::clone(&logger.sinks);
        let metrics = Arc::clone(&logger.metrics);

        match thread::Builder::new()
            .name("logger-worker".to_string())
            .spawn(move || Self::run_worker(receiver, sinks, metrics))
        {
            Ok(handle) => {
                logger.sender = Some(sender);
                logger.worker = Some(handle);
            }
            Err(e) => {
                eprintln!(
                    "[LOGGER ERROR] Failed to spawn async worker: {}. Logging synchronously.",
                    e
                );
            }
        }
        logger
    }

    /// Create a logger from configuration
    ///
    /// Assembles console, file, broker and debug sinks as configured. With
    /// the `kafka` feature disabled a configuration that enables the broker
    /// is rejected; use [`LoggerConfig::build_with_client`] to supply a client.
    pub fn from_config(config: &LoggerConfig) -> Result<Self> {
        config.build()
    }

    fn run_worker(receiver: Receiver<LogEntry>, sinks: SinkList, metrics: Arc<LoggerMetrics>) {
        let mut batch = Vec::with_capacity(BATCH_SIZE);

        while let Ok(entry) = receiver.recv() {
            batch.push(entry);
            while batch.len() < BATCH_SIZE {
                match receiver.try_recv() {
                    Ok(entry) => batch.push(entry),
                    Err(_) => break,
                }
            }

            let guard = sinks.read();
            for entry in batch.drain(..) {
                Self::dispatch(&guard, &entry, &metrics);
            }
            Self::flush_isolated(&guard);
        }
    }

    /// Fire one entry at every applicable sink, isolating each one
    ///
    /// The entry counts as dropped only when every sink it was meant for
    /// failed. Sinks synchronize internally, so dispatch only needs the
    /// shared lock on the sink list.
    fn dispatch(sinks: &[Box<dyn Sink>], entry: &LogEntry, metrics: &LoggerMetrics) {
        let mut attempted = 0usize;
        let mut failed = 0usize;

        for sink in sinks {
            if !sink.levels().contains(&entry.level) {
                continue;
            }
            attempted += 1;

            match catch_unwind(AssertUnwindSafe(|| sink.fire(entry))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    metrics.record_sink_failure();
                    eprintln!("[LOGGER ERROR] Sink '{}' failed: {}", sink.name(), e);
                }
                Err(panic) => {
                    failed += 1;
                    metrics.record_sink_failure();
                    eprintln!(
                        "[LOGGER ERROR] Sink '{}' panicked: {}. Other sinks continue.",
                        sink.name(),
                        panic_message(panic.as_ref())
                    );
                }
            }
        }

        if attempted > 0 && failed == attempted {
            metrics.record_dropped();
        } else {
            metrics.record_logged();
        }
    }

    fn flush_isolated(sinks: &[Box<dyn Sink>]) -> usize {
        Self::each_isolated(sinks, "flush", |sink| sink.flush())
    }

    /// Run `op` on every sink, isolating each one; returns how many failed
    fn each_isolated<F>(sinks: &[Box<dyn Sink>], action: &str, op: F) -> usize
    where
        F: Fn(&dyn Sink) -> Result<()>,
    {
        let mut failed = 0;
        for sink in sinks {
            match catch_unwind(AssertUnwindSafe(|| op(sink.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    eprintln!("[LOGGER ERROR] Sink '{}' {} failed: {}", sink.name(), action, e);
                }
                Err(panic) => {
                    failed += 1;
                    eprintln!(
                        "[LOGGER ERROR] Sink '{}' panicked during {}: {}",
                        sink.name(),
                        action,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }
        failed
    }

    pub fn add_sink(&self, sink: Box<dyn Sink>) {
        self.sinks.write().push(sink);
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.sinks.read().iter().map(|s| s.name().to_string()).collect()
    }

    pub fn set_min_level(&self, level: LogLevel) {
        *self.min_level.write() = level;
    }

    pub fn min_level(&self) -> LogLevel {
        *self.min_level.read()
    }

    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= *self.min_level.read()
    }

    /// Fields added to every entry this logger emits
    pub fn base_fields(&self) -> &LogContext {
        &self.base_fields
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(level, message.into(), None);
    }

    /// Log with structured fields attached to this one entry
    pub fn log_with_fields(&self, level: LogLevel, message: impl Into<String>, fields: &LogContext) {
        self.emit(level, message.into(), Some(fields));
    }

    fn emit(&self, level: LogLevel, message: String, fields: Option<&LogContext>) {
        if self.closed || !self.is_enabled(level) {
            return;
        }

        let mut entry = LogEntry::new(level, message);
        entry.fields.merge(&self.base_fields);
        if let Some(fields) = fields {
            entry.fields.merge(fields);
        }
        self.send_entry(entry);
    }

    fn send_entry(&self, entry: LogEntry) {
        let Some(sender) = &self.sender else {
            let sinks = self.sinks.read();
            Self::dispatch(&sinks, &entry, &self.metrics);
            return;
        };

        match sender.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => self.handle_overflow(sender, entry),
            // shutting down
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn handle_overflow(&self, sender: &Sender<LogEntry>, entry: LogEntry) {
        self.metrics.record_queue_full();

        match self.overflow_policy {
            OverflowPolicy::Block => {
                self.metrics.record_block();
                let _ = sender.send(entry);
            }
            OverflowPolicy::BlockWithTimeout(timeout) => {
                self.metrics.record_block();
                if let Err(SendTimeoutError::Timeout(_)) = sender.send_timeout(entry, timeout) {
                    self.alert_and_drop();
                }
            }
            OverflowPolicy::DropNewest => {
                self.metrics.record_dropped();
            }
            OverflowPolicy::AlertAndDrop => self.alert_and_drop(),
        }
    }

    /// Count a drop; warn and call the callback on the first and every 1000th
    fn alert_and_drop(&self) {
        let dropped = self.metrics.record_dropped() + 1;
        if dropped == 1 || dropped % 1000 == 0 {
            eprintln!(
                "[LOGGER WARNING] Queue full, {} logs dropped. \
                 Consider increasing buffer size or using a different overflow policy.",
                dropped
            );
            if let Some(callback) = &self.on_overflow {
                callback(dropped);
            }
        }
    }

    /// Scope whose entries all carry `fields`
    ///
    /// # Example
    ///
    /// ```
    /// use rust_kafka_logger::prelude::*;
    ///
    /// let logger = Logger::new();
    /// let request = logger.with_fields(LogContext::new().with_field("request_id", "r-42"));
    /// request.info("accepted");
    /// request.with_fields(LogContext::new().with_field("step", 2)).warn("slow");
    /// ```
    pub fn with_fields(&self, fields: LogContext) -> LogScope<'_> {
        LogScope {
            logger: self,
            fields,
        }
    }

    /// Scope whose entries are routed to `topic` by the broker sink
    pub fn with_topic(&self, topic: impl Into<String>) -> LogScope<'_> {
        self.with_fields(LogContext::new().with_field(TOPIC_FIELD, topic.into()))
    }

    pub fn t_trace(&self, topic: impl Into<String>, message: impl Into<String>) {
        self.with_topic(topic).trace(message);
    }

    pub fn t_debug(&self, topic: impl Into<String>, message: impl Into<String>) {
        self.with_topic(topic).debug(message);
    }

    pub fn t_info(&self, topic: impl Into<String>, message: impl Into<String>) {
        self.with_topic(topic).info(message);
    }

    pub fn t_warn(&self, topic: impl Into<String>, message: impl Into<String>) {
        self.with_topic(topic).warn(message);
    }

    pub fn t_error(&self, topic: impl Into<String>, message: impl Into<String>) {
        self.with_topic(topic).error(message);
    }

    pub fn t_fatal(&self, topic: impl Into<String>, message: impl Into<String>) {
        self.with_topic(topic).fatal(message);
    }

    /// The producer behind the broker sink, if one is configured
    pub fn broker(&self) -> Option<&Arc<BrokerProducer>> {
        self.broker.as_ref()
    }

    fn require_broker(&self) -> Result<&Arc<BrokerProducer>> {
        self.broker
            .as_ref()
            .ok_or_else(|| LoggerError::config("logger", "no broker sink is configured"))
    }

    /// Replace the broker filter hook
    pub fn set_filter_fn<F>(&self, filter: F) -> Result<()>
    where
        F: Fn(&mut Record) + Send + Sync + 'static,
    {
        self.require_broker()?.set_filter_fn(filter);
        Ok(())
    }

    /// Replace the broker key hook used by the function key strategy
    pub fn set_key_fn<F>(&self, key_fn: F) -> Result<()>
    where
        F: Fn(&mut Record) -> String + Send + Sync + 'static,
    {
        self.require_broker()?.set_key_fn(key_fn);
        Ok(())
    }

    pub fn dropped_count(&self) -> u64 {
        self.metrics.dropped_count()
    }

    pub fn queue_full_count(&self) -> u64 {
        self.metrics.queue_full_events()
    }

    pub fn block_count(&self) -> u64 {
        self.metrics.block_events()
    }

    /// Counters for dropped entries, sink failures and throughput
    ///
    /// # Example
    ///
    /// ```
    /// use rust_kafka_logger::Logger;
    ///
    /// let logger = Logger::with_async(100);
    /// let metrics = logger.metrics();
    /// println!("Dropped: {}", metrics.dropped_count());
    /// println!("Drop rate: {:.2}%", metrics.drop_rate());
    /// ```
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    /// Flush every sink
    ///
    /// A failing or panicking sink does not stop the others from flushing;
    /// the error reports how many failed.
    pub fn flush(&self) -> Result<()> {
        match Self::flush_isolated(&self.sinks.read()) {
            0 => Ok(()),
            failed => Err(LoggerError::other(format!("{} sink(s) failed to flush", failed))),
        }
    }

    #[inline]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Log at `Fatal`; the process keeps running
    #[inline]
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }

    /// Drain the queue, close every sink and the broker producer
    ///
    /// Returns `false` if the worker did not finish within `timeout` or a
    /// sink failed to close. Later calls are no-ops returning `true`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_kafka_logger::Logger;
    /// use std::time::Duration;
    ///
    /// let mut logger = Logger::with_async(1000);
    /// logger.info("Important message");
    /// if !logger.shutdown(Duration::from_secs(10)) {
    ///     eprintln!("Warning: Logger shutdown timed out");
    /// }
    /// ```
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        if self.closed {
            return true;
        }
        self.closed = true;

        drop(self.sender.take());

        if let Some(handle) = self.worker.take() {
            let start = Instant::now();
            while !handle.is_finished() {
                if start.elapsed() >= timeout {
                    eprintln!(
                        "[LOGGER WARNING] Async worker did not finish within {:?}. \
                         Some logs may be lost.",
                        timeout
                    );
                    return false;
                }
                thread::sleep(Duration::from_millis(10));
            }
            if handle.join().is_err() {
                eprintln!("[LOGGER ERROR] Async worker thread panicked during shutdown");
                return false;
            }
        }

        let mut ok = true;
        {
            let sinks = self.sinks.read();
            ok &= Self::flush_isolated(&sinks) == 0;
            ok &= Self::each_isolated(&sinks, "close", |sink| sink.close()) == 0;
        }

        if let Some(broker) = &self.broker {
            if let Err(e) = broker.close() {
                ok = false;
                eprintln!("[LOGGER ERROR] Failed to close broker producer: {}", e);
            }
        }
        ok
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);

        let dropped = self.metrics.dropped_count();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Logger shutting down with {} dropped logs (drop rate: {:.2}%)",
                dropped,
                self.metrics.drop_rate()
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// A view of a [`Logger`] that attaches fields to every entry
///
/// Scopes nest; a nested scope's fields override the outer ones on
/// collision.
#[derive(Clone)]
pub struct LogScope<'a> {
    logger: &'a Logger,
    fields: LogContext,
}

impl<'a> LogScope<'a> {
    #[must_use]
    pub fn with_fields(&self, fields: LogContext) -> LogScope<'a> {
        let mut merged = self.fields.clone();
        merged.merge(&fields);
        LogScope {
            logger: self.logger,
            fields: merged,
        }
    }

    #[must_use]
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<FieldValue>) -> LogScope<'a> {
        self.with_fields(LogContext::new().with_field(key, value))
    }

    #[must_use]
    pub fn with_topic(&self, topic: impl Into<String>) -> LogScope<'a> {
        self.with_field(TOPIC_FIELD, topic.into())
    }

    pub fn fields(&self) -> &LogContext {
        &self.fields
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.logger.emit(level, message.into(), Some(&self.fields));
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use rust_kafka_logger::prelude::*;
/// use std::sync::Arc;
///
/// let logger = Logger::builder()
///     .min_level(LogLevel::Debug)
///     .sink(ConsoleSink::new())
///     .field("service", "checkout")
///     .async_mode(1000)
///     .overflow_policy(OverflowPolicy::AlertAndDrop)
///     .on_overflow(Arc::new(|count| {
///         eprintln!("ALERT: {} logs dropped", count);
///     }))
///     .build();
/// ```
pub struct LoggerBuilder {
    min_level: LogLevel,
    sinks: Vec<Box<dyn Sink>>,
    base_fields: LogContext,
    async_buffer: Option<usize>,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    broker: Option<Arc<BrokerProducer>>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            min_level: LogLevel::Info,
            sinks: Vec::new(),
            base_fields: LogContext::new(),
            async_buffer: None,
            overflow_policy: OverflowPolicy::default(),
            on_overflow: None,
            broker: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn boxed_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Attach a broker sink over `producer`
    ///
    /// The producer also becomes the target of
    /// [`Logger::set_filter_fn`] and [`Logger::set_key_fn`].
    #[must_use = "builder methods return a new value"]
    pub fn broker(self, producer: Arc<BrokerProducer>, mode: BrokerMode) -> Self {
        self.broker_sink(BrokerSink::new(producer, mode))
    }

    #[must_use = "builder methods return a new value"]
    pub fn broker_sink(mut self, sink: BrokerSink) -> Self {
        self.broker = Some(Arc::clone(sink.producer()));
        self.sinks.push(Box::new(sink));
        self
    }

    /// Field added to every entry
    #[must_use = "builder methods return a new value"]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.base_fields.add_field(key, value);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn fields(mut self, fields: &LogContext) -> Self {
        self.base_fields.merge(fields);
        self
    }

    /// Enable async mode with a queue of `buffer_size` entries
    #[must_use = "builder methods return a new value"]
    pub fn async_mode(mut self, buffer_size: usize) -> Self {
        self.async_buffer = Some(buffer_size);
        self
    }

    /// What to do when the async queue is full; default is
    /// [`OverflowPolicy::Block`]
    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Called with the running dropped count when entries are dropped
    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    pub fn build(self) -> Logger {
        let mut logger = match self.async_buffer {
            Some(size) => Logger::with_async_config(size, self.overflow_policy, self.on_overflow),
            None => Logger::new(),
        };

        logger.set_min_level(self.min_level);
        logger.base_fields = self.base_fields;
        logger.broker = self.broker;
        for sink in self.sinks {
            logger.add_sink(sink);
        }
        logger
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{ChannelClient, ProducerConfig, ProducerMessage};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Sink that records every entry it receives
    #[derive(Clone, Default)]
    struct RecordingSink {
        entries: Arc<Mutex<Vec<LogEntry>>>,
        flushes: Arc<AtomicU64>,
        delay: Option<Duration>,
    }

    impl RecordingSink {
        fn messages(&self) -> Vec<String> {
            self.entries.lock().iter().map(|e| e.message.clone()).collect()
        }
    }

    impl Sink for RecordingSink {
        fn fire(&self, entry: &LogEntry) -> Result<()> {
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            self.entries.lock().push(entry.clone());
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            self.flushes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct FailingSink {
        panic: bool,
    }

    impl Sink for FailingSink {
        fn fire(&self, _entry: &LogEntry) -> Result<()> {
            if self.panic {
                panic!("sink exploded");
            }
            Err(LoggerError::writer("always fails"))
        }

        fn flush(&self) -> Result<()> {
            if self.panic {
                panic!("flush exploded");
            }
            Err(LoggerError::writer("flush always fails"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn broker_logger() -> (Logger, crossbeam_channel::Receiver<ProducerMessage>) {
        let (client, broker) = ChannelClient::bounded(32);
        let producer =
            BrokerProducer::with_client(ProducerConfig::default(), None, Box::new(client)).unwrap();
        let logger = Logger::builder()
            .broker(Arc::new(producer), BrokerMode::Hook)
            .build();
        (logger, broker)
    }

    #[test]
    fn test_builder_defaults() {
        let logger = Logger::builder().build();
        assert_eq!(logger.min_level(), LogLevel::Info);
        assert!(logger.sink_names().is_empty());
        assert!(logger.broker().is_none());
        assert_eq!(logger.dropped_count(), 0);
    }

    #[test]
    fn test_every_sink_gets_every_entry_once() {
        let first = RecordingSink::default();
        let second = RecordingSink::default();
        let logger = Logger::builder()
            .sink(first.clone())
            .sink(second.clone())
            .build();

        logger.info("one");
        logger.warn("two");

        assert_eq!(first.messages(), vec!["one", "two"]);
        assert_eq!(second.messages(), vec!["one", "two"]);
        assert_eq!(logger.metrics().total_logged(), 2);
    }

    #[test]
    fn test_min_level_filters() {
        let sink = RecordingSink::default();
        let logger = Logger::builder()
            .min_level(LogLevel::Warn)
            .sink(sink.clone())
            .build();

        logger.info("hidden");
        logger.error("shown");
        logger.set_min_level(LogLevel::Trace);
        logger.trace("now shown");

        assert_eq!(sink.messages(), vec!["shown", "now shown"]);
    }

    #[test]
    fn test_failing_sink_does_not_stop_others() {
        let sink = RecordingSink::default();
        let logger = Logger::builder()
            .sink(FailingSink { panic: false })
            .sink(FailingSink { panic: true })
            .sink(sink.clone())
            .build();

        logger.info("survives");

        assert_eq!(sink.messages(), vec!["survives"]);
        assert_eq!(logger.metrics().sink_failures(), 2);
        assert_eq!(logger.dropped_count(), 0);
    }

    #[test]
    fn test_flush_reaches_every_sink() {
        let sink = RecordingSink::default();
        let logger = Logger::builder()
            .sink(FailingSink { panic: true })
            .sink(FailingSink { panic: false })
            .sink(sink.clone())
            .build();

        let err = logger.flush().unwrap_err();
        assert!(err.to_string().contains("2 sink(s)"));
        assert_eq!(sink.flushes.load(Ordering::Relaxed), 1);

        let healthy = Logger::builder().sink(sink.clone()).build();
        assert!(healthy.flush().is_ok());
        assert_eq!(sink.flushes.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_sync_callers_fire_concurrently() {
        let delay = Duration::from_millis(100);
        let sink = RecordingSink {
            delay: Some(delay),
            ..RecordingSink::default()
        };
        let logger = Logger::builder().sink(sink.clone()).build();

        let start = Instant::now();
        thread::scope(|scope| {
            for i in 0..4 {
                let logger = &logger;
                scope.spawn(move || logger.info(format!("caller {}", i)));
            }
        });

        assert_eq!(sink.messages().len(), 4);
        assert!(start.elapsed() < delay * 3, "callers were serialized: {:?}", start.elapsed());
    }

    #[test]
    fn test_entry_dropped_when_all_sinks_fail() {
        let logger = Logger::builder()
            .sink(FailingSink { panic: false })
            .build();
        logger.info("lost");
        assert_eq!(logger.dropped_count(), 1);
    }

    #[test]
    fn test_scoped_and_base_fields() {
        let sink = RecordingSink::default();
        let logger = Logger::builder()
            .field("service", "api")
            .sink(sink.clone())
            .build();

        let scope = logger.with_fields(LogContext::new().with_field("request", "r1"));
        scope.with_field("request", "r2").with_field("step", 3).info("nested");
        scope.info("outer");

        let entries = sink.entries.lock();
        let nested = &entries[0].fields;
        assert_eq!(nested.get("service").and_then(FieldValue::as_str), Some("api"));
        assert_eq!(nested.get("request").and_then(FieldValue::as_str), Some("r2"));
        assert_eq!(nested.get("step"), Some(&FieldValue::Int(3)));
        assert_eq!(
            entries[1].fields.get("request").and_then(FieldValue::as_str),
            Some("r1")
        );
        assert!(entries[1].fields.get("step").is_none());
    }

    #[test]
    fn test_topic_helpers_route_broker_messages() {
        let (logger, broker) = broker_logger();

        logger.t_warn("audit", "login failed");
        logger.with_topic("billing").error("card declined");
        logger.info("default");

        let topics: Vec<String> = broker.try_iter().map(|m| m.topic).collect();
        assert_eq!(topics, vec!["audit", "billing", "logs"]);
    }

    #[test]
    fn test_hooks_require_broker() {
        let logger = Logger::new();
        assert!(logger.set_filter_fn(|_: &mut Record| {}).is_err());
        assert!(logger.set_key_fn(|_: &mut Record| "k".into()).is_err());
    }

    #[test]
    fn test_filter_hook_applies_to_broker_only() {
        let sink = RecordingSink::default();
        let (client, broker) = ChannelClient::bounded(8);
        let producer =
            BrokerProducer::with_client(ProducerConfig::default(), None, Box::new(client)).unwrap();
        let logger = Logger::builder()
            .sink(sink.clone())
            .broker(Arc::new(producer), BrokerMode::Hook)
            .build();

        logger
            .set_filter_fn(|record: &mut Record| {
                record.insert("redacted".into(), serde_json::Value::Bool(true));
            })
            .unwrap();
        logger.info("secret");

        let value: serde_json::Value =
            serde_json::from_slice(&broker.recv().unwrap().value).unwrap();
        assert_eq!(value["redacted"], true);
        assert!(sink.entries.lock()[0].fields.get("redacted").is_none());
    }

    #[test]
    fn test_async_shutdown_drains_queue() {
        let sink = RecordingSink::default();
        let mut logger = Logger::builder()
            .async_mode(1000)
            .sink(sink.clone())
            .build();

        for i in 0..200 {
            logger.info(format!("Message {}", i));
        }
        assert!(logger.shutdown(Duration::from_secs(5)));
        assert_eq!(sink.messages().len(), 200);
        assert!(logger.shutdown(Duration::from_secs(1)));
    }

    #[test]
    fn test_block_policy_loses_nothing() {
        let sink = RecordingSink {
            delay: Some(Duration::from_millis(1)),
            ..RecordingSink::default()
        };
        let mut logger = Logger::builder()
            .async_mode(2)
            .overflow_policy(OverflowPolicy::Block)
            .sink(sink.clone())
            .build();

        for i in 0..50 {
            logger.info(format!("Message {}", i));
        }
        assert!(logger.shutdown(Duration::from_secs(5)));
        assert_eq!(sink.messages().len(), 50);
        assert_eq!(logger.dropped_count(), 0);
    }

    #[test]
    fn test_drop_newest_counts_drops() {
        let sink = RecordingSink {
            delay: Some(Duration::from_millis(20)),
            ..RecordingSink::default()
        };
        let mut logger = Logger::builder()
            .async_mode(1)
            .overflow_policy(OverflowPolicy::DropNewest)
            .sink(sink.clone())
            .build();

        for i in 0..20 {
            logger.info(format!("Message {}", i));
        }
        assert!(logger.shutdown(Duration::from_secs(5)));

        let delivered = sink.messages().len() as u64;
        assert!(logger.dropped_count() > 0);
        assert_eq!(delivered + logger.dropped_count(), 20);
    }

    #[test]
    fn test_alert_and_drop_calls_callback() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let sink = RecordingSink {
            delay: Some(Duration::from_millis(20)),
            ..RecordingSink::default()
        };
        let mut logger = Logger::builder()
            .async_mode(1)
            .overflow_policy(OverflowPolicy::AlertAndDrop)
            .on_overflow(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            }))
            .sink(sink)
            .build();

        for i in 0..20 {
            logger.info(format!("Message {}", i));
        }
        logger.shutdown(Duration::from_secs(5));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
