//! Debug sink: dumps the raw record of every entry

use crate::core::{Formatter, LogEntry, OutputFormat, Result, Sink};
use parking_lot::Mutex;
use std::io::{self, Write};

/// Writes `entry <{record}>` lines to stderr, or to a supplied writer
pub struct DebugSink {
    formatter: Formatter,
    writer: Option<Mutex<Box<dyn Write + Send>>>,
}

impl DebugSink {
    pub fn new() -> Self {
        Self {
            formatter: Formatter::new(OutputFormat::Json),
            writer: None,
        }
    }

    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            formatter: Formatter::new(OutputFormat::Json),
            writer: Some(Mutex::new(Box::new(writer))),
        }
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }
}

impl Default for DebugSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for DebugSink {
    fn fire(&self, entry: &LogEntry) -> Result<()> {
        let record = serde_json::Value::Object(self.formatter.to_record(entry));
        match &self.writer {
            Some(writer) => writeln!(writer.lock(), "entry <{}>", record)?,
            None => writeln!(io::stderr().lock(), "entry <{}>", record)?,
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        match &self.writer {
            Some(writer) => writer.lock().flush()?,
            None => io::stderr().flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "debug"
    }
}
