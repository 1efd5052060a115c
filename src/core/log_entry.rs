//! Log entry structure

use super::log_context::LogContext;
use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A rendered log record as an unordered field map
///
/// This is the shape the broker pipeline parses, mutates and re-serializes.
pub type Record = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "LogContext::is_empty")]
    pub fields: LogContext,
}

impl LogEntry {
    /// Sanitize log message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// to prevent attackers from injecting fake log entries.
    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(level: LogLevel, message: impl AsRef<str>) -> Self {
        Self {
            level,
            message: Self::sanitize_message(message.as_ref()),
            timestamp: Utc::now(),
            fields: LogContext::new(),
        }
    }

    #[must_use]
    pub fn with_fields(mut self, fields: LogContext) -> Self {
        self.fields.merge(&fields);
        self
    }
}
