//! Kafka client built on `rdkafka`
//!
//! Messages go through a bounded input channel to a dispatcher thread that
//! owns the `BaseProducer`. The dispatcher polls for delivery callbacks
//! between messages, retries when the local producer queue is full, and
//! flushes on shutdown.

use super::client::{BrokerClient, DeliveryReport, ProducerMessage};
use super::config::{Partitioner, ProducerConfig};
use super::partition::RoundRobin;
use crate::core::{LoggerError, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{BaseProducer, BaseRecord, DeliveryResult, Producer, ProducerContext};
use rdkafka::ClientContext;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Forwards delivery callbacks as [`DeliveryReport`]s when debug is enabled
struct ReportingContext {
    reports: Option<Sender<DeliveryReport>>,
}

impl ClientContext for ReportingContext {}

impl ProducerContext for ReportingContext {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        let Some(reports) = &self.reports else {
            return;
        };
        let report = match result {
            Ok(message) => DeliveryReport::Delivered {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            },
            Err((error, message)) => DeliveryReport::Failed {
                topic: message.topic().to_string(),
                error: error.to_string(),
            },
        };
        // a slow drain must not stall the producer's poll loop
        let _ = reports.try_send(report);
    }
}

type KafkaProducer = BaseProducer<ReportingContext>;

pub struct KafkaClient {
    input: RwLock<Option<Sender<ProducerMessage>>>,
    reports: Mutex<Option<Receiver<DeliveryReport>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl KafkaClient {
    /// Create the producer and start the dispatcher thread
    pub fn connect(config: &ProducerConfig) -> Result<Self> {
        let mut client_config = ClientConfig::new();
        for (name, value) in config.client_settings()? {
            client_config.set(name, value);
        }

        let (report_tx, report_rx) = if config.enable_debug {
            let (tx, rx) = bounded(config.channel_buffer_size.max(1));
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let producer: KafkaProducer =
            client_config.create_with_context(ReportingContext { reports: report_tx })?;

        let (input_tx, input_rx) = bounded(config.channel_buffer_size.max(1));
        let round_robin = RoundRobin::new(config.partitioner == Partitioner::RoundRobin);

        let dispatcher = thread::Builder::new()
            .name("kafka-dispatcher".to_string())
            .spawn(move || dispatch(producer, input_rx, round_robin))
            .map_err(|e| {
                LoggerError::io_operation("spawn kafka dispatcher", "thread spawn failed", e)
            })?;

        tracing::debug!(
            brokers = %config.brokers.join(","),
            topic = %config.topic,
            "kafka producer started"
        );

        Ok(Self {
            input: RwLock::new(Some(input_tx)),
            reports: Mutex::new(report_rx),
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }
}

impl BrokerClient for KafkaClient {
    fn enqueue(&self, message: ProducerMessage) -> Result<()> {
        let input = self
            .input
            .read()
            .clone()
            .ok_or_else(|| LoggerError::broker("kafka client is closed"))?;
        input
            .send(message)
            .map_err(|_| LoggerError::broker("kafka dispatcher stopped"))
    }

    fn take_reports(&self) -> Option<Receiver<DeliveryReport>> {
        self.reports.lock().take()
    }

    fn close(&self) -> Result<()> {
        self.input.write().take();
        if let Some(handle) = self.dispatcher.lock().take() {
            handle
                .join()
                .map_err(|_| LoggerError::broker("kafka dispatcher panicked"))?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "kafka"
    }
}

impl Drop for KafkaClient {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            eprintln!("[LOGGER ERROR] {}", e);
        }
    }
}

fn dispatch(
    producer: KafkaProducer,
    input: Receiver<ProducerMessage>,
    mut round_robin: RoundRobin,
) {
    loop {
        match input.recv_timeout(POLL_INTERVAL) {
            Ok(message) => produce(&producer, &message, &mut round_robin),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        producer.poll(Duration::ZERO);
    }

    if let Err(e) = producer.flush(FLUSH_TIMEOUT) {
        eprintln!("[LOGGER ERROR] Failed to flush kafka producer: {}", e);
    }
}

fn produce(producer: &KafkaProducer, message: &ProducerMessage, round_robin: &mut RoundRobin) {
    let mut record = BaseRecord::to(&message.topic)
        .key(&message.key)
        .payload(&message.value);
    let partition = round_robin.next_partition(&message.topic, || {
        partition_count(producer, &message.topic)
    });
    if let Some(partition) = partition {
        record = record.partition(partition);
    }

    loop {
        match producer.send(record) {
            Ok(()) => return,
            Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), returned)) => {
                record = returned;
                producer.poll(POLL_INTERVAL);
            }
            Err((e, _)) => {
                tracing::warn!(topic = %message.topic, error = %e, "failed to queue message");
                return;
            }
        }
    }
}

fn partition_count(producer: &KafkaProducer, topic: &str) -> Option<i32> {
    let metadata = producer
        .client()
        .fetch_metadata(Some(topic), METADATA_TIMEOUT)
        .ok()?;
    metadata
        .topics()
        .first()
        .map(|t| t.partitions().len() as i32)
}
