//! Standalone event sender
//!
//! For programs that publish events to the broker without going through a
//! logger.

use super::client::BrokerClient;
use super::config::ProducerConfig;
use super::envelope::EnvelopeConfig;
use super::producer::BrokerProducer;
use crate::core::Result;
use serde::Serialize;

/// Thin publishing front end over a [`BrokerProducer`]
///
/// # Example
///
/// ```
/// use rust_kafka_logger::broker::{ChannelClient, ProducerConfig, Sender};
/// use serde_json::json;
///
/// let (client, broker) = ChannelClient::bounded(4);
/// let sender = Sender::with_client(ProducerConfig::default(), None, Box::new(client)).unwrap();
///
/// sender.send_json(&json!({"topic": "orders", "level": "info", "order": 42})).unwrap();
/// assert_eq!(broker.recv().unwrap().topic, "orders");
/// ```
#[derive(Debug)]
pub struct Sender {
    producer: BrokerProducer,
}

impl Sender {
    #[cfg(feature = "kafka")]
    pub fn connect(config: ProducerConfig, envelope: Option<EnvelopeConfig>) -> Result<Self> {
        Ok(Self {
            producer: BrokerProducer::connect(config, envelope)?,
        })
    }

    pub fn with_client(
        config: ProducerConfig,
        envelope: Option<EnvelopeConfig>,
        client: Box<dyn BrokerClient>,
    ) -> Result<Self> {
        Ok(Self {
            producer: BrokerProducer::with_client(config, envelope, client)?,
        })
    }

    pub fn producer(&self) -> &BrokerProducer {
        &self.producer
    }

    /// Send a JSON record through the full pipeline
    pub fn send_event(&self, payload: &[u8]) -> Result<()> {
        self.producer.send_message(payload)
    }

    /// Serialize `event` to JSON and send it through the full pipeline
    pub fn send_json<T: Serialize + ?Sized>(&self, event: &T) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.producer.send_message(&payload)
    }

    /// Send bytes untouched to one topic
    pub fn send_raw(&self, topic: &str, key: &str, value: Vec<u8>) -> Result<()> {
        self.producer.send_raw(topic, key, value)
    }

    /// Send the same bytes to every topic in `topics`
    pub fn send_multi(&self, topics: &[&str], key: &str, value: &[u8]) -> Result<()> {
        self.producer.send_multi(topics, key, value)
    }

    pub fn close(&self) -> Result<()> {
        self.producer.close()
    }
}
