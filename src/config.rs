//! Logger configuration
//!
//! A [`LoggerConfig`] comes from defaults, a TOML file, environment
//! variables, or a file overlaid with the environment. Every field has a
//! default, so a file only needs the settings it changes:
//!
//! ```toml
//! level = "debug"
//! enable_kafka = true
//! kafka_mode = "stream"
//!
//! [kafka]
//! brokers = ["kafka-1:9092", "kafka-2:9092"]
//! topic = "service-logs"
//!
//! [envelope]
//! source = "https://example.com/checkout"
//! ```
//!
//! Environment variables use the upper-cased field name behind one prefix
//! per table: `RKLOG_` for the top level, `RKKAFKA_` for `[kafka]`,
//! `RKCE_` for `[envelope]` and `RKROT_` for `[rotation]`. For example
//! `RKLOG_LEVEL=warn`, `RKKAFKA_BROKERS=a:9092,b:9092`, `RKCE_ID_STRATEGY=uuid`.

use crate::broker::{BrokerClient, BrokerProducer, EnvelopeConfig, ProducerConfig};
use crate::core::{
    FieldValue, Formatter, LogContext, LogLevel, Logger, LoggerError, OutputFormat, Result,
};
use crate::sinks::{
    BrokerMode, BrokerSink, ConsoleSink, ConsoleTarget, DebugSink, FileSink, RotatingFileSink,
    RotationConfig, RotationPolicy,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

pub const LOG_ENV_PREFIX: &str = "RKLOG_";
pub const KAFKA_ENV_PREFIX: &str = "RKKAFKA_";
pub const ENVELOPE_ENV_PREFIX: &str = "RKCE_";
pub const ROTATION_ENV_PREFIX: &str = "RKROT_";

/// Selects the configuration source for [`init_from_env`](crate::global::init_from_env)
pub const CONFIG_TYPE_ENV: &str = "RKLOG_CFGTYPE";
/// Overrides [`DEFAULT_CONFIG_FILE`]
pub const CONFIG_FILE_ENV: &str = "RKLOG_CFGFILE";
pub const DEFAULT_CONFIG_FILE: &str = "rk_log_config.toml";

/// Where [`LoggerConfig::load`] reads from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    Defaults,
    /// Defaults overridden by environment variables
    #[default]
    Env,
    File,
    /// A file overridden by environment variables
    EnvAndFile,
}

impl FromStr for ConfigSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "defaults" => Ok(ConfigSource::Defaults),
            "env" => Ok(ConfigSource::Env),
            "file" => Ok(ConfigSource::File),
            "both" | "env_and_file" => Ok(ConfigSource::EnvAndFile),
            _ => Err(format!("Invalid configuration source: '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub enable_timestamps: bool,
    /// Colour the level in text console output
    pub enable_color_levels: bool,
    /// Enrich broker records with the event envelope and use envelope field
    /// names in structured output
    pub enable_cloud_events: bool,

    pub enable_console: bool,
    pub console_format: OutputFormat,
    pub console_writer: ConsoleTarget,

    pub enable_file: bool,
    pub file_format: OutputFormat,
    pub file_location: PathBuf,
    /// Rotate the log file according to `[rotation]`
    pub enable_rotation: bool,

    pub enable_kafka: bool,
    pub kafka_format: OutputFormat,
    pub kafka_mode: BrokerMode,

    /// Dump every record to stderr
    pub enable_debug: bool,
    /// Queue size for async dispatch; synchronous when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub async_buffer: Option<usize>,

    pub envelope: EnvelopeConfig,
    pub kafka: ProducerConfig,
    pub rotation: RotationConfig,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enable_timestamps: true,
            enable_color_levels: true,
            enable_cloud_events: true,
            enable_console: true,
            console_format: OutputFormat::Text,
            console_writer: ConsoleTarget::Stdout,
            enable_file: false,
            file_format: OutputFormat::Json,
            file_location: PathBuf::from(concat!(env!("CARGO_PKG_NAME"), ".log")),
            enable_rotation: false,
            enable_kafka: false,
            kafka_format: OutputFormat::CloudEvents,
            kafka_mode: BrokerMode::Hook,
            enable_debug: false,
            async_buffer: None,
            envelope: EnvelopeConfig::default(),
            kafka: ProducerConfig::default(),
            rotation: RotationConfig::default(),
        }
    }
}

impl LoggerConfig {
    /// Load from `source`; `path` names the file for the file-based sources
    /// and defaults to [`DEFAULT_CONFIG_FILE`]
    pub fn load(source: ConfigSource, path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = match source {
            ConfigSource::Defaults | ConfigSource::Env => Self::default(),
            ConfigSource::File | ConfigSource::EnvAndFile => Self::from_file(path)?,
        };
        if matches!(source, ConfigSource::Env | ConfigSource::EnvAndFile) {
            config.apply_process_env()?;
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| LoggerError::config("config file", e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(
                "read config file",
                format!("Failed to read '{}'", path.display()),
                e,
            )
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| LoggerError::config("config export", e.to_string()))
    }

    /// Write the effective configuration as TOML
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        fs::write(path, content).map_err(|e| {
            LoggerError::io_operation(
                "export config",
                format!("Failed to write '{}'", path.display()),
                e,
            )
        })
    }

    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env_overrides(|name| std::env::var(name).ok())
    }

    /// Override fields from variables returned by `lookup`
    ///
    /// Empty values are ignored. Every unparsable value is reported in one
    /// error; the valid ones are still applied.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = EnvReader::new(lookup);

        env.prefix(LOG_ENV_PREFIX);
        env.set("LEVEL", &mut self.level);
        env.set("ENABLE_TIMESTAMPS", &mut self.enable_timestamps);
        env.set("ENABLE_COLOR_LEVELS", &mut self.enable_color_levels);
        env.set("ENABLE_CLOUD_EVENTS", &mut self.enable_cloud_events);
        env.set("ENABLE_CONSOLE", &mut self.enable_console);
        env.set("CONSOLE_FORMAT", &mut self.console_format);
        env.set("CONSOLE_WRITER", &mut self.console_writer);
        env.set("ENABLE_FILE", &mut self.enable_file);
        env.set("FILE_FORMAT", &mut self.file_format);
        env.set("FILE_LOCATION", &mut self.file_location);
        env.set("ENABLE_ROTATION", &mut self.enable_rotation);
        env.set("ENABLE_KAFKA", &mut self.enable_kafka);
        env.set("KAFKA_FORMAT", &mut self.kafka_format);
        env.set("KAFKA_MODE", &mut self.kafka_mode);
        env.set("ENABLE_DEBUG", &mut self.enable_debug);
        env.set_opt("ASYNC_BUFFER", &mut self.async_buffer);

        let kafka = &mut self.kafka;
        env.prefix(KAFKA_ENV_PREFIX);
        env.set_list("BROKERS", &mut kafka.brokers);
        env.set("TOPIC", &mut kafka.topic);
        env.set("PARTITIONER", &mut kafka.partitioner);
        env.set("KEY", &mut kafka.key);
        env.set("KEY_NAME", &mut kafka.key_name);
        env.set("COMPRESSION", &mut kafka.compression);
        env.set("ACK_WAIT", &mut kafka.ack_wait);
        env.set("FLUSH_FREQUENCY_MS", &mut kafka.flush_frequency_ms);
        env.set("RETRY_MAX", &mut kafka.retry_max);
        env.set("RETRY_BACKOFF_MS", &mut kafka.retry_backoff_ms);
        env.set("METADATA_RETRY_MAX", &mut kafka.metadata_retry_max);
        env.set("METADATA_RETRY_BACKOFF_MS", &mut kafka.metadata_retry_backoff_ms);
        env.set("CHANNEL_BUFFER_SIZE", &mut kafka.channel_buffer_size);
        env.set("ENABLE_TLS", &mut kafka.enable_tls);
        env.set("ENABLE_DEBUG", &mut kafka.enable_debug);

        let mut tls = kafka.tls.clone().unwrap_or_default();
        let before = tls.clone();
        env.set_opt("TLS_CA_LOCATION", &mut tls.ca_location);
        env.set_opt("TLS_CERTIFICATE_LOCATION", &mut tls.certificate_location);
        env.set_opt("TLS_KEY_LOCATION", &mut tls.key_location);
        env.set_opt("TLS_KEY_PASSWORD", &mut tls.key_password);
        if tls != before {
            kafka.tls = Some(tls);
        }

        let envelope = &mut self.envelope;
        env.prefix(ENVELOPE_ENV_PREFIX);
        env.set("ID_STRATEGY", &mut envelope.id_strategy);
        env.set("HMAC_KEY", &mut envelope.hmac_key);
        env.set("SOURCE", &mut envelope.source);
        env.set("SPEC_VERSION", &mut envelope.spec_version);
        env.set("EVENT_TYPE", &mut envelope.event_type);
        env.set("SET_SUBJECT_LEVEL", &mut envelope.set_subject_level);
        env.set_opt("SUBJECT", &mut envelope.subject);

        let rotation = &mut self.rotation;
        env.prefix(ROTATION_ENV_PREFIX);
        env.set("MAX_SIZE_MB", &mut rotation.max_size_mb);
        env.set("MAX_AGE_DAYS", &mut rotation.max_age_days);
        env.set("MAX_BACKUPS", &mut rotation.max_backups);
        env.set("LOCAL_TIME", &mut rotation.local_time);
        env.set_opt("DAILY_AT_HOUR", &mut rotation.daily_at_hour);
        env.set("COMPRESS", &mut rotation.compress);

        env.finish()
    }

    /// Check the whole configuration, reporting every problem at once
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.console_format == OutputFormat::CloudEvents {
            problems.push("console_format may not be cloudevents".to_string());
        }
        if self.file_format == OutputFormat::CloudEvents {
            problems.push("file_format may not be cloudevents".to_string());
        }
        if self.enable_file && self.file_location.as_os_str().is_empty() {
            problems.push("file_location is empty while the file sink is enabled".to_string());
        }
        if self.async_buffer == Some(0) {
            problems.push("async_buffer must be greater than zero".to_string());
        }
        if self.enable_rotation && self.rotation.daily_at_hour.is_some_and(|h| h > 23) {
            problems.push("rotation.daily_at_hour must be between 0 and 23".to_string());
        }

        if self.enable_kafka {
            match self.kafka_format {
                OutputFormat::Text => {
                    problems.push("kafka_format must be json or cloudevents".to_string())
                }
                OutputFormat::CloudEvents if !self.enable_cloud_events => problems
                    .push("kafka_format cloudevents requires enable_cloud_events".to_string()),
                _ => {}
            }
            if let Err(e) = self.kafka.validate() {
                problems.push(e.to_string());
            }
        }

        if problems.is_empty() {
            return Ok(());
        }
        Err(LoggerError::config(
            "logger",
            format!("{} problem(s) found: {}", problems.len(), problems.join("; ")),
        ))
    }

    /// Build a logger with the sinks this configuration enables
    pub fn build(&self) -> Result<Logger> {
        self.build_with_client(None)
    }

    /// Like [`build`](Self::build), but the broker sink publishes through
    /// `client` when one is given instead of connecting to Kafka
    pub fn build_with_client(&self, client: Option<Box<dyn BrokerClient>>) -> Result<Logger> {
        self.validate()?;

        if self.enable_debug {
            if let Ok(text) = self.to_toml_string() {
                eprintln!("{}", text);
            }
        }

        let mut builder = Logger::builder().min_level(self.level);
        if let Some(size) = self.async_buffer {
            builder = builder.async_mode(size);
        }
        if self.enable_cloud_events {
            builder = builder.fields(&self.envelope_fields());
        }

        if self.enable_console {
            let colors = self.enable_color_levels && self.console_format == OutputFormat::Text;
            builder = builder.sink(
                ConsoleSink::new()
                    .with_target(self.console_writer)
                    .with_formatter(self.formatter(self.console_format).with_colors(colors)),
            );
        }

        if self.enable_file {
            let formatter = self.formatter(self.file_format);
            builder = if self.enable_rotation {
                let policy = RotationPolicy::from(&self.rotation);
                builder.sink(
                    RotatingFileSink::with_policy(&self.file_location, policy)?
                        .with_formatter(formatter),
                )
            } else {
                builder.sink(FileSink::new(&self.file_location)?.with_formatter(formatter))
            };
        }

        if self.enable_kafka {
            let envelope = self.enable_cloud_events.then(|| self.envelope.clone());
            let producer = match client {
                Some(client) => BrokerProducer::with_client(self.kafka.clone(), envelope, client)?,
                None => connect_producer(self.kafka.clone(), envelope)?,
            };
            let sink = BrokerSink::new(Arc::new(producer), self.kafka_mode)
                .with_formatter(self.formatter(self.kafka_format))?;
            builder = builder.broker_sink(sink);
        }

        if self.enable_debug {
            let formatter = self.formatter(OutputFormat::Json);
            builder = builder.sink(DebugSink::new().with_formatter(formatter));
        }

        Ok(builder.build())
    }

    fn formatter(&self, format: OutputFormat) -> Formatter {
        let formatter = Formatter::new(format).with_timestamps(self.enable_timestamps);
        if self.enable_cloud_events && format.is_structured() {
            formatter.with_field_names(self.envelope.field_names())
        } else {
            formatter
        }
    }

    /// The envelope's fixed fields as base fields for every sink
    fn envelope_fields(&self) -> LogContext {
        let mut fields = LogContext::new();
        for (key, value) in crate::broker::build_fixed_fields(&self.envelope) {
            if let serde_json::Value::String(value) = value {
                fields.add_field(key, FieldValue::String(value));
            }
        }
        fields
    }
}

#[cfg(feature = "kafka")]
fn connect_producer(
    config: ProducerConfig,
    envelope: Option<EnvelopeConfig>,
) -> Result<BrokerProducer> {
    BrokerProducer::connect(config, envelope)
}

#[cfg(not(feature = "kafka"))]
fn connect_producer(
    _config: ProducerConfig,
    _envelope: Option<EnvelopeConfig>,
) -> Result<BrokerProducer> {
    Err(LoggerError::config(
        "kafka",
        "built without the `kafka` feature; supply a client through build_with_client",
    ))
}

struct EnvReader<F> {
    lookup: F,
    prefix: &'static str,
    errors: Vec<String>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: F) -> Self {
        Self {
            lookup,
            prefix: "",
            errors: Vec::new(),
        }
    }

    fn prefix(&mut self, prefix: &'static str) {
        self.prefix = prefix;
    }

    fn raw(&self, name: &str) -> Option<(String, String)> {
        let var = format!("{}{}", self.prefix, name);
        let value = (self.lookup)(&var)?.trim().to_string();
        (!value.is_empty()).then_some((var, value))
    }

    fn parse<T>(&mut self, name: &str) -> Option<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let (var, value) = self.raw(name)?;
        match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                self.errors.push(format!("{}={}: {}", var, value, e));
                None
            }
        }
    }

    fn set<T>(&mut self, name: &str, target: &mut T)
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if let Some(value) = self.parse(name) {
            *target = value;
        }
    }

    fn set_opt<T>(&mut self, name: &str, target: &mut Option<T>)
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if let Some(value) = self.parse(name) {
            *target = Some(value);
        }
    }

    /// Comma separated list
    fn set_list(&mut self, name: &str, target: &mut Vec<String>) {
        if let Some((_, value)) = self.raw(name) {
            *target = value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(LoggerError::config(
            "environment",
            format!(
                "{} invalid variable(s): {}",
                self.errors.len(),
                self.errors.join("; ")
            ),
        ))
    }
}
