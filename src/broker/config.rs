//! Producer configuration and its translation into client properties

use super::key::KeyStrategy;
use crate::core::{LoggerError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Topic used when neither the record nor the config names one
pub const DEFAULT_TOPIC: &str = "logs";
pub const DEFAULT_BROKER: &str = "localhost:9092";
/// Sidecar field that routes a single record to another topic
pub const TOPIC_FIELD: &str = "topic";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partitioner {
    #[default]
    Random,
    /// Consistent hash of the key
    Hash,
    #[serde(rename = "roundrobin")]
    RoundRobin,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Snappy => "snappy",
            Compression::Lz4 => "lz4",
            Compression::Zstd => "zstd",
        }
    }
}

/// How many acknowledgements a produce request waits for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckWait {
    None,
    /// Leader only
    #[default]
    Local,
    /// Full in-sync replica set
    All,
}

impl AckWait {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckWait::None => "0",
            AckWait::Local => "1",
            AckWait::All => "all",
        }
    }
}

macro_rules! impl_from_str {
    ($ty:ty, $($name:literal => $variant:expr),+ $(,)?) => {
        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    _ => Err(format!("Invalid {}: '{}'", stringify!($ty), s)),
                }
            }
        }
    };
}

impl_from_str!(Partitioner, "random" => Partitioner::Random, "hash" => Partitioner::Hash,
    "roundrobin" => Partitioner::RoundRobin, "round_robin" => Partitioner::RoundRobin);
impl_from_str!(Compression, "none" => Compression::None, "gzip" => Compression::Gzip,
    "snappy" => Compression::Snappy, "lz4" => Compression::Lz4, "zstd" => Compression::Zstd);
impl_from_str!(AckWait, "none" => AckWait::None, "0" => AckWait::None, "local" => AckWait::Local,
    "1" => AckWait::Local, "all" => AckWait::All, "-1" => AckWait::All);

/// TLS material, all paths in PEM format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub ca_location: Option<PathBuf>,
    pub certificate_location: Option<PathBuf>,
    pub key_location: Option<PathBuf>,
    pub key_password: Option<String>,
}

/// Broker producer settings
///
/// Retry and backoff values of zero mean "leave the client default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerConfig {
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub partitioner: Partitioner,
    #[serde(default)]
    pub key: KeyStrategy,
    /// Fixed key, or the field name for the extracted strategy
    #[serde(default = "default_key_name")]
    pub key_name: String,
    #[serde(default = "default_compression")]
    pub compression: Compression,
    #[serde(default)]
    pub ack_wait: AckWait,
    #[serde(default = "default_flush_frequency_ms")]
    pub flush_frequency_ms: u64,
    #[serde(default = "default_retry_max")]
    pub retry_max: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Has no rdkafka equivalent; only zero or the default of 10 is accepted
    #[serde(default = "default_retry_max")]
    pub metadata_retry_max: u32,
    #[serde(default = "default_metadata_retry_backoff_ms")]
    pub metadata_retry_backoff_ms: u64,
    /// Capacity of the client's input queue; a full queue blocks senders
    #[serde(default = "default_channel_buffer_size")]
    pub channel_buffer_size: usize,
    #[serde(default)]
    pub enable_tls: bool,
    /// Drain delivery reports and log them through `tracing`
    #[serde(default)]
    pub enable_debug: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

fn default_brokers() -> Vec<String> {
    vec![DEFAULT_BROKER.to_string()]
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

/// Current user name, else the crate name
pub fn default_key_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

fn default_compression() -> Compression {
    Compression::Snappy
}

fn default_flush_frequency_ms() -> u64 {
    500
}

fn default_retry_max() -> u32 {
    10
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_metadata_retry_backoff_ms() -> u64 {
    2000
}

fn default_channel_buffer_size() -> usize {
    256
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            topic: default_topic(),
            partitioner: Partitioner::default(),
            key: KeyStrategy::default(),
            key_name: default_key_name(),
            compression: default_compression(),
            ack_wait: AckWait::default(),
            flush_frequency_ms: default_flush_frequency_ms(),
            retry_max: default_retry_max(),
            retry_backoff_ms: default_retry_backoff_ms(),
            metadata_retry_max: default_retry_max(),
            metadata_retry_backoff_ms: default_metadata_retry_backoff_ms(),
            channel_buffer_size: default_channel_buffer_size(),
            enable_tls: false,
            enable_debug: false,
            tls: None,
        }
    }
}

impl ProducerConfig {
    /// Copy with defaults substituted for an empty broker list, topic or key name
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.brokers.retain(|b| !b.trim().is_empty());
        if self.brokers.is_empty() {
            self.brokers = default_brokers();
        }
        if self.topic.is_empty() {
            self.topic = default_topic();
        }
        if self.key_name.is_empty() {
            self.key_name = default_key_name();
        }
        if self.channel_buffer_size == 0 {
            self.channel_buffer_size = default_channel_buffer_size();
        }
        self
    }

    /// Client properties for this configuration
    ///
    /// Round-robin has no client-side partitioner name; it maps to `random`
    /// and the client assigns partitions itself. Zero retry and backoff
    /// values are left out so the client default applies.
    pub fn client_settings(&self) -> Result<Vec<(&'static str, String)>> {
        if self.metadata_retry_max != 0 && self.metadata_retry_max != default_retry_max() {
            return Err(LoggerError::config(
                "producer",
                format!(
                    "metadata_retry_max = {} is not supported by the kafka client; \
                     use metadata_retry_backoff_ms to tune metadata refresh",
                    self.metadata_retry_max
                ),
            ));
        }

        let mut settings = vec![
            ("bootstrap.servers", self.brokers.join(",")),
            (
                "partitioner",
                match self.partitioner {
                    Partitioner::Random | Partitioner::RoundRobin => "random",
                    Partitioner::Hash => "fnv1a",
                }
                .to_string(),
            ),
            ("compression.type", self.compression.as_str().to_string()),
            ("acks", self.ack_wait.as_str().to_string()),
        ];

        if self.flush_frequency_ms > 0 {
            settings.push(("linger.ms", self.flush_frequency_ms.to_string()));
        }
        if self.retry_max > 0 {
            settings.push(("message.send.max.retries", self.retry_max.to_string()));
        }
        if self.retry_backoff_ms > 0 {
            settings.push(("retry.backoff.ms", self.retry_backoff_ms.to_string()));
        }
        if self.metadata_retry_backoff_ms > 0 {
            settings.push((
                "topic.metadata.refresh.fast.interval.ms",
                self.metadata_retry_backoff_ms.to_string(),
            ));
        }
        if self.enable_tls {
            let tls = self.tls.as_ref().ok_or_else(|| {
                LoggerError::config("producer", "TLS is enabled but no TLS config was provided")
            })?;
            settings.push(("security.protocol", "ssl".to_string()));
            let paths = [
                ("ssl.ca.location", &tls.ca_location),
                ("ssl.certificate.location", &tls.certificate_location),
                ("ssl.key.location", &tls.key_location),
            ];
            for (name, path) in paths {
                if let Some(path) = path {
                    settings.push((name, path.display().to_string()));
                }
            }
            if let Some(password) = &tls.key_password {
                settings.push(("ssl.key.password", password.clone()));
            }
        }

        Ok(settings)
    }

    /// Check the settings that can be judged without a client
    pub fn validate(&self) -> Result<()> {
        self.client_settings().map(|_| ())
    }
}
