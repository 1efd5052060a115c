//! Console sink

use crate::core::{Formatter, LogEntry, OutputFormat, Result, Sink};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Standard stream the console sink writes to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    Stderr,
}

impl std::str::FromStr for ConsoleTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stdout" => Ok(ConsoleTarget::Stdout),
            "stderr" => Ok(ConsoleTarget::Stderr),
            _ => Err(format!("Invalid console target: '{}'", s)),
        }
    }
}

pub struct ConsoleSink {
    formatter: Formatter,
    target: ConsoleTarget,
    /// Replaces the standard stream when set
    writer: Option<Mutex<Box<dyn Write + Send>>>,
}

impl ConsoleSink {
    /// Coloured text on stdout
    pub fn new() -> Self {
        Self {
            formatter: Formatter::new(OutputFormat::Text).with_colors(true),
            target: ConsoleTarget::Stdout,
            writer: None,
        }
    }

    /// Write to an arbitrary writer instead of a standard stream
    ///
    /// # Example
    ///
    /// ```
    /// use rust_kafka_logger::sinks::ConsoleSink;
    /// use rust_kafka_logger::core::{Formatter, OutputFormat};
    ///
    /// let sink = ConsoleSink::with_writer(Vec::new())
    ///     .with_formatter(Formatter::new(OutputFormat::Json));
    /// ```
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            formatter: Formatter::new(OutputFormat::Text),
            target: ConsoleTarget::Stdout,
            writer: Some(Mutex::new(Box::new(writer))),
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: ConsoleTarget) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn fire(&self, entry: &LogEntry) -> Result<()> {
        let line = self.formatter.render(entry)?;
        match (&self.writer, self.target) {
            (Some(writer), _) => writeln!(writer.lock(), "{}", line)?,
            (None, ConsoleTarget::Stdout) => writeln!(io::stdout().lock(), "{}", line)?,
            (None, ConsoleTarget::Stderr) => writeln!(io::stderr().lock(), "{}", line)?,
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        match (&self.writer, self.target) {
            (Some(writer), _) => writer.lock().flush()?,
            (None, ConsoleTarget::Stdout) => io::stdout().flush()?,
            (None, ConsoleTarget::Stderr) => io::stderr().flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;
    use crate::sinks::SharedBuffer;

    #[test]
    fn test_writes_one_line_per_entry() {
        let buffer = SharedBuffer::new();
        let sink = ConsoleSink::with_writer(buffer.clone())
            .with_formatter(Formatter::new(OutputFormat::Text).with_timestamps(false));

        sink.fire(&LogEntry::new(LogLevel::Info, "first")).unwrap();
        sink.fire(&LogEntry::new(LogLevel::Error, "second")).unwrap();
        sink.flush().unwrap();

        assert_eq!(buffer.contents(), "[INFO ] first\n[ERROR] second\n");
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!("STDERR".parse::<ConsoleTarget>().unwrap(), ConsoleTarget::Stderr);
        assert!("file".parse::<ConsoleTarget>().is_err());
        assert_eq!(ConsoleSink::new().target(), ConsoleTarget::Stdout);
    }
}
