//! Sink implementations

pub mod broker;
pub mod console;
pub mod debug;
pub mod file;
pub mod rotating_file;

pub use broker::{BrokerMode, BrokerSink};
pub use console::{ConsoleSink, ConsoleTarget};
pub use debug::DebugSink;
pub use file::FileSink;
pub use rotating_file::{RotatingFileSink, RotationConfig, RotationPolicy, RotationStrategy};

pub use crate::core::Sink;

use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

/// In-memory writer whose clones share one buffer
///
/// Hand one clone to a [`ConsoleSink`] or [`DebugSink`] and read what was
/// written through another.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
