//! Plain file sink

use crate::core::{Formatter, LogEntry, LoggerError, OutputFormat, Result, Sink};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct FileSink {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
    formatter: Formatter,
}

impl FileSink {
    /// Open `path` for appending, creating parent directories
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LoggerError::file_sink(path.display().to_string(), e.to_string()))?;

        Ok(Self {
            path,
            writer: Mutex::new(Some(BufWriter::new(file))),
            formatter: Formatter::new(OutputFormat::Text),
        })
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn fire(&self, entry: &LogEntry) -> Result<()> {
        let mut line = self.formatter.render(entry)?;
        line.push('\n');

        let mut guard = self.writer.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| LoggerError::writer("File writer not initialized"))?;
        writer.write_all(line.as_bytes())?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if let Some(writer) = self.writer.lock().as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if let Some(mut writer) = self.writer.lock().take() {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogContext, LogLevel};
    use tempfile::tempdir;

    #[test]
    fn test_appends_formatted_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("app.log");

        let sink = FileSink::new(&path)
            .unwrap()
            .with_formatter(Formatter::new(OutputFormat::Text).with_timestamps(false));
        let entry = LogEntry::new(LogLevel::Warn, "disk low")
            .with_fields(LogContext::new().with_field("free_mb", 12));
        sink.fire(&entry).unwrap();
        sink.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "[WARN ] disk low free_mb=12\n");
    }

    #[test]
    fn test_fire_after_close_fails() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("closed.log")).unwrap();
        sink.close().unwrap();
        assert!(sink
            .fire(&LogEntry::new(LogLevel::Info, "late"))
            .is_err());
    }
}
