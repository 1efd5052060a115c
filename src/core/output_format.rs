//! Output formats and the per-sink formatter
//!
//! Every sink owns a [`Formatter`]. Formats:
//! - Text: human-readable line (default)
//! - Json: one JSON object per entry
//! - CloudEvents: JSON using the envelope field names (`data`, `time`, `subject`)

use super::error::Result;
use super::log_entry::{LogEntry, Record};
use super::timestamp::TimestampFormat;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output format for log entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Example: `[2025-01-08T10:30:45Z] [INFO ] Request processed user=42`
    #[default]
    Text,

    /// Example: `{"level":"info","message":"Request processed","timestamp":"2025-01-08T10:30:45Z"}`
    Json,

    /// Example: `{"data":"Request processed","subject":"info","time":"2025-01-08T10:30:45Z"}`
    #[serde(rename = "cloudevents")]
    CloudEvents,
}

impl OutputFormat {
    pub fn is_structured(&self) -> bool {
        !matches!(self, OutputFormat::Text)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "cloudevents" | "cloud_events" => Ok(OutputFormat::CloudEvents),
            _ => Err(format!("Invalid output format: '{}'", s)),
        }
    }
}

/// Names of the three fields every structured entry carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames {
    pub message: String,
    pub level: String,
    pub time: String,
}

impl FieldNames {
    pub fn standard() -> Self {
        Self {
            message: "message".to_string(),
            level: "level".to_string(),
            time: "timestamp".to_string(),
        }
    }

    /// Names used once envelope enrichment is on; the level becomes the
    /// subject when `subject_level` is set.
    pub fn envelope(subject_level: bool) -> Self {
        Self {
            message: "data".to_string(),
            level: if subject_level { "subject" } else { "level" }.to_string(),
            time: "time".to_string(),
        }
    }
}

impl Default for FieldNames {
    fn default() -> Self {
        Self::standard()
    }
}

/// Renders entries for one sink
///
/// # Example
///
/// ```
/// use rust_kafka_logger::core::{Formatter, LogEntry, LogLevel, OutputFormat};
///
/// let formatter = Formatter::new(OutputFormat::Json).with_timestamps(false);
/// let line = formatter.render(&LogEntry::new(LogLevel::Info, "ready")).unwrap();
/// assert_eq!(line, r#"{"level":"info","message":"ready"}"#);
/// ```
#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
    names: FieldNames,
    timestamp_format: TimestampFormat,
    timestamps: bool,
    colors: bool,
}

impl Formatter {
    pub fn new(format: OutputFormat) -> Self {
        let names = match format {
            OutputFormat::CloudEvents => FieldNames::envelope(true),
            _ => FieldNames::standard(),
        };
        Self {
            format,
            names,
            timestamp_format: TimestampFormat::default(),
            timestamps: true,
            colors: false,
        }
    }

    #[must_use]
    pub fn with_field_names(mut self, names: FieldNames) -> Self {
        self.names = names;
        self
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Include the time field / prefix
    #[must_use]
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Colour the level in text output
    #[must_use]
    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.colors = enabled;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn field_names(&self) -> &FieldNames {
        &self.names
    }

    /// Render an entry as a single line without trailing newline
    pub fn render(&self, entry: &LogEntry) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(self.render_text(entry)),
            OutputFormat::Json | OutputFormat::CloudEvents => {
                Ok(serde_json::to_string(&self.to_record(entry))?)
            }
        }
    }

    /// Build the structured field map for an entry
    ///
    /// A user field that collides with one of the three entry fields is kept
    /// under `fields.<name>` instead of overwriting it.
    pub fn to_record(&self, entry: &LogEntry) -> Record {
        let mut record = Record::new();

        for (key, value) in entry.fields.fields() {
            let key = if self.is_reserved(key) {
                format!("fields.{}", key)
            } else {
                key.clone()
            };
            record.insert(key, value.to_json_value());
        }

        if self.timestamps {
            record.insert(
                self.names.time.clone(),
                self.timestamp_format.to_json_value(&entry.timestamp),
            );
        }
        record.insert(
            self.names.level.clone(),
            Value::String(entry.level.as_field().to_string()),
        );
        record.insert(
            self.names.message.clone(),
            Value::String(entry.message.clone()),
        );
        record
    }

    fn is_reserved(&self, key: &str) -> bool {
        key == self.names.message || key == self.names.level || key == self.names.time
    }

    fn render_text(&self, entry: &LogEntry) -> String {
        let level = format!("{:5}", entry.level.to_str());
        let level = if self.colors {
            level.color(entry.level.color_code()).to_string()
        } else {
            level
        };

        let mut line = if self.timestamps {
            format!(
                "[{}] [{}] {}",
                self.timestamp_format.format(&entry.timestamp),
                level,
                entry.message
            )
        } else {
            format!("[{}] {}", level, entry.message)
        };

        if !entry.fields.is_empty() {
            line.push(' ');
            line.push_str(&entry.fields.format_fields());
        }
        line
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputFormat::Text)
    }
}
