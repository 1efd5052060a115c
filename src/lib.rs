//! # Rust Kafka Logger
//!
//! Structured logging that fans every entry out to a set of sinks: console,
//! plain or rotating file, a Kafka broker and a debug dump. Records bound
//! for the broker can be enriched with a CloudEvents-style envelope
//! (`id`, `source`, `specversion`, `type`, `time`, `subject`, `data`) and
//! are keyed and routed per entry.
//!
//! ## Features
//!
//! - **Fan-out**: every enabled sink receives every entry exactly once; a
//!   failing sink never stops the others
//! - **Broker pipeline**: topic routing, partition key policies, filter and
//!   key hooks, envelope enrichment
//! - **Lifecycle-safe writer**: close waits for in-flight writes and rejects
//!   new ones
//! - **Configuration**: TOML files and `RK*` environment variables
//! - **Kafka client** behind the `kafka` feature; an in-memory
//!   [`ChannelClient`](broker::ChannelClient) otherwise
//!
//! ## Example
//!
//! ```
//! use rust_kafka_logger::prelude::*;
//! use std::sync::Arc;
//!
//! let (client, broker) = ChannelClient::bounded(16);
//! let producer = BrokerProducer::with_client(
//!     ProducerConfig::default(),
//!     Some(EnvelopeConfig::default()),
//!     Box::new(client),
//! )
//! .unwrap();
//!
//! let logger = Logger::builder()
//!     .broker(Arc::new(producer), BrokerMode::Hook)
//!     .build();
//!
//! logger.t_info("orders", "order accepted");
//! let message = broker.recv().unwrap();
//! assert_eq!(message.topic, "orders");
//! ```

pub mod broker;
pub mod config;
pub mod core;
pub mod global;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::broker::{
        BrokerProducer, ChannelClient, EnvelopeConfig, IdStrategy, KeyStrategy, ProducerConfig,
        Sender,
    };
    pub use crate::config::{ConfigSource, LoggerConfig};
    pub use crate::core::{
        FieldValue, Formatter, LogContext, LogEntry, LogLevel, LogScope, Logger, LoggerBuilder,
        LoggerError, LoggerMetrics, OutputFormat, OverflowCallback, OverflowPolicy, Record,
        Result, Sink, TimestampFormat, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::sinks::{
        BrokerMode, BrokerSink, ConsoleSink, ConsoleTarget, DebugSink, FileSink,
        RotatingFileSink, RotationPolicy,
    };
}

pub use config::{ConfigSource, LoggerConfig};
pub use core::{
    FieldValue, Formatter, LogContext, LogEntry, LogLevel, LogScope, Logger, LoggerBuilder,
    LoggerError, LoggerMetrics, OutputFormat, OverflowCallback, OverflowPolicy, Record, Result,
    Sink, DEFAULT_SHUTDOWN_TIMEOUT,
};
