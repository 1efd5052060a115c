//! Error types for the logger and its broker pipeline

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// File sink error with path
    #[error("File sink error for '{path}': {message}")]
    FileSinkError { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Failed to hand an entry to the async worker
    #[error("Failed to send log entry to async worker")]
    ChannelSendError,

    /// Payload handed to the broker pipeline is not a JSON object
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Extracted key strategy found no usable key field
    #[error("Key field '{field}' is missing from the record")]
    MissingKeyField { field: String },

    /// A field that must hold a specific type holds something else
    #[error("Field '{field}' is not a {expected}")]
    FieldType { field: String, expected: String },

    /// Key derivation produced an empty key
    #[error("Key strategy '{strategy}' produced an empty key")]
    EmptyKey { strategy: String },

    /// Write attempted on a closed writer
    #[error("Invalid state: writer is closed")]
    InvalidState,

    /// Close called on a writer that is already closed
    #[error("Writer already closed")]
    AlreadyClosed,

    /// Broker client failure
    #[error("Broker error: {0}")]
    Broker(String),

    /// Kafka client error
    #[cfg(feature = "kafka")]
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a file sink error
    pub fn file_sink(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileSinkError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn missing_key(field: impl Into<String>) -> Self {
        LoggerError::MissingKeyField {
            field: field.into(),
        }
    }

    pub fn field_type(field: impl Into<String>, expected: impl Into<String>) -> Self {
        LoggerError::FieldType {
            field: field.into(),
            expected: expected.into(),
        }
    }

    pub fn empty_key(strategy: impl Into<String>) -> Self {
        LoggerError::EmptyKey {
            strategy: strategy.into(),
        }
    }

    pub fn broker<S: Into<String>>(msg: S) -> Self {
        LoggerError::Broker(msg.into())
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// Whether this error was raised for a single record rather than the pipeline
    #[must_use]
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            LoggerError::MalformedRecord(_)
                | LoggerError::MissingKeyField { .. }
                | LoggerError::FieldType { .. }
                | LoggerError::EmptyKey { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LoggerError::config("producer", "TLS enabled without TLS config");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));

        let err = LoggerError::missing_key("subject");
        assert!(matches!(err, LoggerError::MissingKeyField { .. }));

        let err = LoggerError::file_sink("/var/log/app.log", "Permission denied");
        assert!(matches!(err, LoggerError::FileSinkError { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = LoggerError::missing_key("subject");
        assert_eq!(err.to_string(), "Key field 'subject' is missing from the record");

        let err = LoggerError::field_type("data", "string");
        assert_eq!(err.to_string(), "Field 'data' is not a string");

        let err = LoggerError::file_rotation("/var/log/app.log", "Disk full");
        assert_eq!(
            err.to_string(),
            "File rotation failed for '/var/log/app.log': Disk full"
        );

        assert_eq!(
            LoggerError::InvalidState.to_string(),
            "Invalid state: writer is closed"
        );
    }

    #[test]
    fn test_record_error_classification() {
        assert!(LoggerError::MalformedRecord("eof".into()).is_record_error());
        assert!(LoggerError::missing_key("k").is_record_error());
        assert!(!LoggerError::InvalidState.is_record_error());
        assert!(!LoggerError::broker("disconnected").is_record_error());
    }

    #[test]
    fn test_io_operation_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = LoggerError::io_operation("writing log file", "cannot write to file", io_err);

        assert!(matches!(err, LoggerError::IoOperation { .. }));
        assert!(err.to_string().contains("writing log file"));
        assert!(err.to_string().contains("cannot write to file"));
    }
}
