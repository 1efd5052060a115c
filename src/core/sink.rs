//! Sink trait for log output destinations

use super::{error::Result, log_entry::LogEntry, log_level::LogLevel};

/// A destination that receives a copy of every emitted entry
///
/// Sinks format with their own [`Formatter`](super::Formatter) and write to
/// their own destination. A failing sink never stops the others.
///
/// Methods take `&self`: the logger fires concurrently from every calling
/// thread, and each sink guards its own writer.
pub trait Sink: Send + Sync {
    /// Levels this sink fires for
    fn levels(&self) -> &[LogLevel] {
        &LogLevel::ALL
    }

    fn fire(&self, entry: &LogEntry) -> Result<()>;

    fn flush(&self) -> Result<()>;

    /// Release the destination; called once at logger shutdown
    fn close(&self) -> Result<()> {
        self.flush()
    }

    fn name(&self) -> &str;
}
