//! Core logger types and traits

pub mod error;
pub mod log_context;
pub mod log_entry;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod output_format;
pub mod overflow_policy;
pub mod sink;
pub mod timestamp;

pub use error::{LoggerError, Result};
pub use log_context::{FieldValue, LogContext};
pub use log_entry::{LogEntry, Record};
pub use log_level::LogLevel;
pub use logger::{LogScope, Logger, LoggerBuilder, DEFAULT_SHUTDOWN_TIMEOUT};
pub use metrics::{DeliveryStats, LoggerMetrics};
pub use output_format::{FieldNames, Formatter, OutputFormat};
pub use overflow_policy::{OverflowCallback, OverflowPolicy};
pub use sink::Sink;
pub use timestamp::TimestampFormat;
