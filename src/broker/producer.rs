//! Broker producer wrapper
//!
//! [`BrokerProducer::send_message`] is the single entry point that turns a
//! rendered JSON record into a broker message. Processing order is fixed:
//!
//! 1. parse the payload into a record
//! 2. take the `topic` sidecar field, else the configured topic
//! 3. derive the key
//! 4. run the filter hook
//! 5. add envelope fields
//! 6. serialize and hand to the client
//!
//! Any failure before step 6 returns without submitting anything.

use super::client::{BrokerClient, DeliveryReport, ProducerMessage};
use super::config::{ProducerConfig, TOPIC_FIELD};
use super::envelope::{Envelope, EnvelopeConfig};
use super::key::{FilterFn, KeyFn, KeyPolicy};
use crate::core::{DeliveryStats, LoggerError, Record, Result};
use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct BrokerProducer {
    config: ProducerConfig,
    envelope: Option<Envelope>,
    client: Box<dyn BrokerClient>,
    filter_fn: RwLock<Option<FilterFn>>,
    key_fn: RwLock<Option<KeyFn>>,
    stats: Arc<DeliveryStats>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl BrokerProducer {
    /// Connect to the brokers named in `config`
    #[cfg(feature = "kafka")]
    pub fn connect(config: ProducerConfig, envelope: Option<EnvelopeConfig>) -> Result<Self> {
        let config = config.with_defaults();
        let client = super::kafka::KafkaClient::connect(&config)?;
        Self::with_client(config, envelope, Box::new(client))
    }

    /// Build a producer on top of an existing client
    ///
    /// With `enable_debug` set and a client that reports deliveries, a
    /// background thread drains the reports into `tracing` and
    /// [`DeliveryStats`]. Otherwise reports are never read.
    pub fn with_client(
        config: ProducerConfig,
        envelope: Option<EnvelopeConfig>,
        client: Box<dyn BrokerClient>,
    ) -> Result<Self> {
        let config = config.with_defaults();
        config.validate()?;

        let stats = Arc::new(DeliveryStats::new());
        let drain = if config.enable_debug {
            client
                .take_reports()
                .map(|reports| spawn_drain(reports, Arc::clone(&stats)))
                .transpose()?
        } else {
            None
        };

        Ok(Self {
            config,
            envelope: envelope.map(Envelope::new),
            client,
            filter_fn: RwLock::new(None),
            key_fn: RwLock::new(None),
            stats,
            drain: Mutex::new(drain),
        })
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    pub fn delivery_stats(&self) -> &DeliveryStats {
        &self.stats
    }

    /// Field the level is read from for the level key strategy
    pub fn level_field(&self) -> &'static str {
        self.envelope
            .as_ref()
            .map_or("level", |envelope| envelope.level_field())
    }

    /// Run the full pipeline for one JSON record
    ///
    /// Blocks while the client's input queue is full.
    pub fn send_message(&self, payload: &[u8]) -> Result<()> {
        let message = self.prepare(payload)?;
        self.client.enqueue(message)
    }

    /// Run every pipeline step except submission
    pub fn prepare(&self, payload: &[u8]) -> Result<ProducerMessage> {
        let mut record = parse_record(payload)?;
        let topic = self.take_topic(&mut record)?;

        let key = {
            let key_fn = self.key_fn.read().clone();
            KeyPolicy {
                strategy: self.config.key,
                key_name: &self.config.key_name,
                level_field: self.level_field(),
                key_fn: key_fn.as_ref(),
            }
            .derive(&mut record)?
        };

        // hooks are cloned out so a hook may replace itself without deadlock
        let filter = self.filter_fn.read().clone();
        if let Some(filter) = filter {
            filter(&mut record);
        }

        if let Some(envelope) = &self.envelope {
            envelope.add_fields(&mut record)?;
        }

        Ok(ProducerMessage {
            topic,
            key,
            value: serde_json::to_vec(&record)?,
        })
    }

    /// Submit bytes as-is, without parsing or enrichment
    ///
    /// An empty topic means the configured topic.
    pub fn send_raw(&self, topic: &str, key: &str, value: Vec<u8>) -> Result<()> {
        if key.is_empty() {
            return Err(LoggerError::empty_key("raw"));
        }
        let topic = if topic.is_empty() {
            self.config.topic.clone()
        } else {
            topic.to_string()
        };
        self.client.enqueue(ProducerMessage {
            topic,
            key: key.to_string(),
            value,
        })
    }

    /// Submit the same bytes to several topics; stops at the first failure
    pub fn send_multi(&self, topics: &[&str], key: &str, value: &[u8]) -> Result<()> {
        for topic in topics {
            self.send_raw(topic, key, value.to_vec())?;
        }
        Ok(())
    }

    pub fn set_filter_fn<F>(&self, filter: F)
    where
        F: Fn(&mut Record) + Send + Sync + 'static,
    {
        *self.filter_fn.write() = Some(Arc::new(filter));
    }

    pub fn set_key_fn<F>(&self, key_fn: F)
    where
        F: Fn(&mut Record) -> String + Send + Sync + 'static,
    {
        *self.key_fn.write() = Some(Arc::new(key_fn));
    }

    pub fn clear_filter_fn(&self) {
        self.filter_fn.write().take();
    }

    pub fn clear_key_fn(&self) {
        self.key_fn.write().take();
    }

    /// Close the client and wait for the delivery drain to finish
    ///
    /// Safe to call more than once.
    pub fn close(&self) -> Result<()> {
        let result = self.client.close();
        if let Some(handle) = self.drain.lock().take() {
            if handle.join().is_err() {
                eprintln!("[LOGGER ERROR] Delivery drain thread panicked");
            }
        }
        result
    }

    fn take_topic(&self, record: &mut Record) -> Result<String> {
        match record.remove(TOPIC_FIELD) {
            Some(Value::String(topic)) if !topic.is_empty() => Ok(topic),
            Some(Value::String(_)) | None => Ok(self.config.topic.clone()),
            Some(_) => Err(LoggerError::field_type(TOPIC_FIELD, "string")),
        }
    }
}

impl Drop for BrokerProducer {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            eprintln!("[LOGGER ERROR] Failed to close broker client: {}", e);
        }
    }
}

impl std::fmt::Debug for BrokerProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerProducer")
            .field("client", &self.client.name())
            .field("topic", &self.config.topic)
            .field("key", &self.config.key)
            .field("envelope", &self.envelope.is_some())
            .finish()
    }
}

fn parse_record(payload: &[u8]) -> Result<Record> {
    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(other) => Err(LoggerError::MalformedRecord(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(LoggerError::MalformedRecord(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn spawn_drain(
    reports: Receiver<DeliveryReport>,
    stats: Arc<DeliveryStats>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("broker-delivery-drain".to_string())
        .spawn(move || {
            for report in reports.iter() {
                match report {
                    DeliveryReport::Delivered {
                        topic,
                        partition,
                        offset,
                    } => {
                        stats.record_delivered();
                        tracing::debug!(%topic, partition, offset, "message delivered");
                    }
                    DeliveryReport::Failed { topic, error } => {
                        stats.record_failed();
                        tracing::warn!(%topic, %error, "message delivery failed");
                    }
                }
            }
        })
        .map_err(|e| LoggerError::io_operation("spawn delivery drain", "thread spawn failed", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::envelope::{IdStrategy, DEFAULT_HMAC_KEY};
    use crate::broker::key::KeyStrategy;
    use crate::broker::ChannelClient;
    use serde_json::json;

    fn producer(
        config: ProducerConfig,
        envelope: Option<EnvelopeConfig>,
    ) -> (BrokerProducer, Receiver<ProducerMessage>) {
        let (client, broker) = ChannelClient::bounded(16);
        let producer = BrokerProducer::with_client(config, envelope, Box::new(client)).unwrap();
        (producer, broker)
    }

    fn fixed(key: &str) -> ProducerConfig {
        ProducerConfig {
            key: KeyStrategy::Fixed,
            key_name: key.to_string(),
            ..ProducerConfig::default()
        }
    }

    fn value(message: &ProducerMessage) -> Value {
        serde_json::from_slice(&message.value).unwrap()
    }

    #[test]
    fn test_topic_sidecar_overrides_and_is_removed() {
        let (producer, broker) = producer(fixed("svc1"), None);
        producer
            .send_message(br#"{"topic":"custom","message":"x"}"#)
            .unwrap();
        producer.send_message(br#"{"message":"y"}"#).unwrap();

        let first = broker.recv().unwrap();
        assert_eq!(first.topic, "custom");
        assert!(value(&first).get("topic").is_none());
        assert_eq!(broker.recv().unwrap().topic, "logs");
    }

    #[test]
    fn test_missing_extracted_key_submits_nothing() {
        let config = ProducerConfig {
            key: KeyStrategy::Extracted,
            key_name: "tenant".into(),
            ..ProducerConfig::default()
        };
        let (producer, broker) = producer(config, None);

        let err = producer.send_message(br#"{"message":"x"}"#).unwrap_err();
        assert!(matches!(err, LoggerError::MissingKeyField { .. }));
        assert!(broker.try_recv().is_err());
    }

    #[test]
    fn test_malformed_payloads() {
        let (producer, broker) = producer(fixed("k"), None);
        for payload in [&b"not json"[..], b"[1,2]", b"\"text\""] {
            assert!(matches!(
                producer.send_message(payload),
                Err(LoggerError::MalformedRecord(_))
            ));
        }
        assert!(broker.try_recv().is_err());
    }

    #[test]
    fn test_non_string_topic_fails() {
        let (producer, broker) = producer(fixed("k"), None);
        let err = producer.send_message(br#"{"topic":3}"#).unwrap_err();
        assert!(matches!(err, LoggerError::FieldType { .. }));
        assert!(broker.try_recv().is_err());
    }

    #[test]
    fn test_filter_runs_after_key_and_before_envelope() {
        let config = ProducerConfig {
            key: KeyStrategy::Extracted,
            key_name: "tenant".into(),
            ..ProducerConfig::default()
        };
        let envelope = EnvelopeConfig {
            id_strategy: IdStrategy::Hmac,
            ..EnvelopeConfig::default()
        };
        let (producer, broker) = producer(config, Some(envelope));
        producer.set_filter_fn(|record: &mut Record| {
            // the extracted key field is already gone
            assert!(!record.contains_key("tenant"));
            record.insert("data".into(), json!("redacted"));
        });

        producer
            .send_message(br#"{"tenant":"acme","data":"secret"}"#)
            .unwrap();
        let message = broker.recv().unwrap();
        let body = value(&message);

        assert_eq!(message.key, "acme");
        assert_eq!(body["data"], "redacted");

        let reference = producer
            .envelope()
            .unwrap()
            .compute_id(&json!({"data": "redacted"}).as_object().unwrap().clone())
            .unwrap()
            .unwrap();
        assert_eq!(body["id"], reference);
        assert_eq!(producer.envelope().unwrap().config().hmac_key, DEFAULT_HMAC_KEY);
    }

    #[test]
    fn test_key_hook_can_be_swapped() {
        let config = ProducerConfig {
            key: KeyStrategy::Function,
            ..ProducerConfig::default()
        };
        let (producer, broker) = producer(config, None);

        producer.send_message(br#"{"level":"info"}"#).unwrap();
        assert_eq!(broker.recv().unwrap().key, "info");

        producer.set_key_fn(|_: &mut Record| "hooked".to_string());
        producer.send_message(br#"{"level":"info"}"#).unwrap();
        assert_eq!(broker.recv().unwrap().key, "hooked");

        producer.clear_key_fn();
        producer.send_message(br#"{"level":"warning"}"#).unwrap();
        assert_eq!(broker.recv().unwrap().key, "warning");
    }

    #[test]
    fn test_send_raw_and_multi() {
        let (producer, broker) = producer(fixed("k"), None);
        producer.send_raw("", "key", b"raw".to_vec()).unwrap();
        producer.send_multi(&["a", "b"], "key", b"fan").unwrap();

        let topics: Vec<String> = broker.try_iter().map(|m| m.topic).collect();
        assert_eq!(topics, vec!["logs", "a", "b"]);
        assert!(producer.send_raw("x", "", Vec::new()).is_err());
    }

    #[test]
    fn test_debug_drain_counts_reports() {
        let config = ProducerConfig {
            enable_debug: true,
            ..fixed("k")
        };
        let (client, broker) = ChannelClient::with_reports(8);
        let producer = BrokerProducer::with_client(config, None, Box::new(client)).unwrap();

        producer.send_message(br#"{"message":"a"}"#).unwrap();
        producer.send_message(br#"{"message":"b"}"#).unwrap();
        producer.close().unwrap();

        assert_eq!(broker.try_iter().count(), 2);
        assert_eq!(producer.delivery_stats().delivered(), 2);
        assert_eq!(producer.delivery_stats().failed(), 0);
    }

    #[test]
    fn test_tls_without_block_fails_construction() {
        let config = ProducerConfig {
            enable_tls: true,
            ..ProducerConfig::default()
        };
        let (client, _broker) = ChannelClient::bounded(1);
        assert!(matches!(
            BrokerProducer::with_client(config, None, Box::new(client)),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }
}
