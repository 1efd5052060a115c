//! Broker client seam
//!
//! A [`BrokerClient`] accepts `(topic, key, value)` messages into a bounded
//! input queue. `enqueue` blocks while that queue is full; that is the only
//! backpressure a caller of the producer sees.

use crate::core::{LoggerError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicI64, Ordering};

/// One message bound for the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerMessage {
    pub topic: String,
    pub key: String,
    pub value: Vec<u8>,
}

impl ProducerMessage {
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// Outcome the client reports for a message, once the broker has answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReport {
    Delivered {
        topic: String,
        partition: i32,
        offset: i64,
    },
    Failed {
        topic: String,
        error: String,
    },
}

pub trait BrokerClient: Send + Sync {
    /// Queue a message; blocks while the input queue is full
    fn enqueue(&self, message: ProducerMessage) -> Result<()>;

    /// Delivery reports, available once and only if the client was built to
    /// produce them
    fn take_reports(&self) -> Option<Receiver<DeliveryReport>> {
        None
    }

    /// Stop accepting messages and release the connection
    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;
}

/// In-memory client backed by a bounded channel
///
/// The receiving half plays the role of the broker. Useful for tests and for
/// handing records to another in-process consumer.
///
/// # Example
///
/// ```
/// use rust_kafka_logger::broker::{BrokerClient, ChannelClient, ProducerMessage};
///
/// let (client, broker) = ChannelClient::bounded(8);
/// client
///     .enqueue(ProducerMessage { topic: "logs".into(), key: "k".into(), value: b"{}".to_vec() })
///     .unwrap();
/// assert_eq!(broker.recv().unwrap().topic, "logs");
/// ```
pub struct ChannelClient {
    input: RwLock<Option<Sender<ProducerMessage>>>,
    acks: RwLock<Option<Sender<DeliveryReport>>>,
    reports: Mutex<Option<Receiver<DeliveryReport>>>,
    offset: AtomicI64,
}

impl ChannelClient {
    pub fn bounded(capacity: usize) -> (Self, Receiver<ProducerMessage>) {
        let (input, output) = bounded(capacity);
        let client = Self {
            input: RwLock::new(Some(input)),
            acks: RwLock::new(None),
            reports: Mutex::new(None),
            offset: AtomicI64::new(0),
        };
        (client, output)
    }

    /// Like [`bounded`](Self::bounded), but every accepted message also
    /// produces a `Delivered` report on partition 0
    pub fn with_reports(capacity: usize) -> (Self, Receiver<ProducerMessage>) {
        let (client, output) = Self::bounded(capacity);
        let (ack_tx, ack_rx) = bounded(capacity.max(1));
        *client.acks.write() = Some(ack_tx);
        *client.reports.lock() = Some(ack_rx);
        (client, output)
    }
}

impl BrokerClient for ChannelClient {
    fn enqueue(&self, message: ProducerMessage) -> Result<()> {
        let input = self
            .input
            .read()
            .clone()
            .ok_or_else(|| LoggerError::broker("client is closed"))?;
        let topic = message.topic.clone();

        input
            .send(message)
            .map_err(|_| LoggerError::broker("input queue disconnected"))?;

        if let Some(acks) = self.acks.read().as_ref() {
            let offset = self.offset.fetch_add(1, Ordering::Relaxed);
            // reports are diagnostics; never block the producer on them
            let _ = acks.try_send(DeliveryReport::Delivered {
                topic,
                partition: 0,
                offset,
            });
        }
        Ok(())
    }

    fn take_reports(&self) -> Option<Receiver<DeliveryReport>> {
        self.reports.lock().take()
    }

    fn close(&self) -> Result<()> {
        self.input.write().take();
        self.acks.write().take();
        Ok(())
    }

    fn name(&self) -> &str {
        "channel"
    }
}
