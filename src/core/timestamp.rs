//! Timestamp formatting utilities
//!
//! Supports RFC 3339, ISO 8601, Unix timestamps and custom strftime formats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp format options for rendered log entries
///
/// # Examples
///
/// ```
/// use rust_kafka_logger::core::TimestampFormat;
/// use chrono::Utc;
///
/// let format = TimestampFormat::Iso8601;
/// assert!(format.format(&Utc::now()).ends_with('Z'));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// RFC 3339 with second precision: `2025-01-08T10:30:45Z`
    #[default]
    Rfc3339,

    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123Z`
    Iso8601,

    /// ISO 8601 with nanoseconds: `2025-01-08T10:30:45.123456789Z`
    Iso8601Nanos,

    /// Unix timestamp in seconds: `1736332245`
    Unix,

    /// Unix timestamp in milliseconds: `1736332245123`
    UnixMillis,

    /// Custom strftime format
    Custom(String),
}

impl TimestampFormat {
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Rfc3339 => datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            TimestampFormat::Iso8601Nanos => {
                datetime.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string()
            }
            TimestampFormat::Unix => datetime.timestamp().to_string(),
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::Custom(format_str) => datetime.format(format_str).to_string(),
        }
    }

    /// JSON value for this timestamp; numeric formats stay numbers
    #[must_use]
    pub fn to_json_value(&self, datetime: &DateTime<Utc>) -> serde_json::Value {
        match self {
            TimestampFormat::Unix => serde_json::Value::from(datetime.timestamp()),
            TimestampFormat::UnixMillis => serde_json::Value::from(datetime.timestamp_millis()),
            _ => serde_json::Value::String(self.format(datetime)),
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, TimestampFormat::Unix | TimestampFormat::UnixMillis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_datetime() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45)
            .single()
            .expect("valid datetime")
            + chrono::Duration::microseconds(123456)
    }

    #[test]
    fn test_rfc3339_format() {
        assert_eq!(
            TimestampFormat::Rfc3339.format(&fixed_datetime()),
            "2025-01-08T10:30:45Z"
        );
    }

    #[test]
    fn test_iso8601_format() {
        assert_eq!(
            TimestampFormat::Iso8601.format(&fixed_datetime()),
            "2025-01-08T10:30:45.123Z"
        );
        assert_eq!(
            TimestampFormat::Iso8601Nanos.format(&fixed_datetime()),
            "2025-01-08T10:30:45.123456000Z"
        );
    }

    #[test]
    fn test_numeric_json_values() {
        let value = TimestampFormat::Unix.to_json_value(&fixed_datetime());
        assert!(value.is_i64());
        let value = TimestampFormat::Iso8601.to_json_value(&fixed_datetime());
        assert!(value.is_string());
    }

    #[test]
    fn test_custom_format() {
        let format = TimestampFormat::Custom("%d/%b/%Y:%H:%M:%S +0000".to_string());
        assert_eq!(format.format(&fixed_datetime()), "08/Jan/2025:10:30:45 +0000");
    }

    #[test]
    fn test_config_names() {
        let format: TimestampFormat =
            serde_json::from_str("\"unix_millis\"").expect("deserialize");
        assert_eq!(format, TimestampFormat::UnixMillis);
    }
}
