//! Broker delivery pipeline: envelope enrichment, key derivation, producer
//! wrapper and the lifecycle-safe writer

pub mod client;
pub mod config;
pub mod envelope;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod key;
mod partition;
pub mod producer;
pub mod sender;
pub mod writer;

pub use client::{BrokerClient, ChannelClient, DeliveryReport, ProducerMessage};
pub use config::{
    AckWait, Compression, Partitioner, ProducerConfig, TlsConfig, DEFAULT_BROKER, DEFAULT_TOPIC,
    TOPIC_FIELD,
};
pub use envelope::{build_fixed_fields, Envelope, EnvelopeConfig, IdStrategy};
#[cfg(feature = "kafka")]
pub use kafka::KafkaClient;
pub use key::{FilterFn, KeyFn, KeyPolicy, KeyStrategy};
pub use producer::BrokerProducer;
pub use sender::Sender;
pub use writer::BrokerWriter;
